use std::sync::Arc;

use crate::document::{self, DocumentParser};
use crate::gemini::{GenerationService, ImageService};
use crate::quiz;
use crate::session::{Completion, Job};
use crate::story::{self, Models};

/// Collaborators a [`Job`] may call.
#[derive(Clone)]
pub struct Services {
    pub text: Arc<dyn GenerationService>,
    pub images: Arc<dyn ImageService>,
    pub documents: Arc<dyn DocumentParser>,
    pub text_model: String,
    pub image_model: String,
}

impl Services {
    fn models(&self) -> Models<'_> {
        Models {
            text: &self.text_model,
            image: &self.image_model,
        }
    }
}

pub async fn run(job: Job, services: &Services) -> Completion {
    match job {
        Job::Story { topic } => {
            let outcome = story::generate(
                services.text.as_ref(),
                services.images.as_ref(),
                services.models(),
                &topic,
            )
            .await;
            Completion::Story(outcome.map_err(|err| report("story", err)))
        }
        Job::LoadDocument { path, file_name } => {
            let outcome = document::extract_file(Arc::clone(&services.documents), &path)
                .await
                .map_err(|err| report("document", err.context("Failed to parse PDF")));
            Completion::Document { file_name, outcome }
        }
        Job::Answer {
            document_text,
            question,
        } => {
            let outcome = document::answer_question(
                services.text.as_ref(),
                &services.text_model,
                &document_text,
                &question,
            )
            .await;
            Completion::Answer(outcome.map_err(|err| report("answer", err)))
        }
        Job::Translate {
            epoch,
            source,
            language,
        } => {
            let outcome = story::translate(
                services.text.as_ref(),
                &services.text_model,
                &source,
                language,
            )
            .await;
            Completion::Translation {
                epoch,
                language,
                outcome: outcome.map_err(|err| report("translation", err)),
            }
        }
        Job::Quiz { epoch, context } => {
            let outcome = quiz::generate(services.text.as_ref(), &services.text_model, &context)
                .await;
            Completion::Quiz {
                epoch,
                outcome: outcome.map_err(|err| report("quiz", err)),
            }
        }
    }
}

fn report(operation: &str, err: anyhow::Error) -> String {
    let message = format!("{err:#}");
    tracing::error!(operation, error = %message, "operation failed");
    message
}
