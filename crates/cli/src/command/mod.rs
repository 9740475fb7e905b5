mod context;
pub mod domain;
mod services;

pub use context::{ConfigTrust, FIXTURE_ENV, PROFILE_ENV, SOURCE_ENV};
#[allow(unused_imports)]
pub use domain::{
    classify_error, CommandAction, CommandRequest, CommandResponse, CommandStatus, Hint, HintKind,
    RequestOptions, ResponseMeta,
};

use navigator_protocol::ErrorEnvelope;
use navigator_resolver::CancelSignal;
use services::Services;
use std::time::Instant;

pub struct CommandHandler {
    services: Services,
    trust: ConfigTrust,
}

impl CommandHandler {
    pub fn new() -> Self {
        Self {
            services: Services::new(),
            trust: ConfigTrust::Local,
        }
    }

    /// Handler for requests arriving over the network.
    pub fn remote() -> Self {
        Self {
            services: Services::new(),
            trust: ConfigTrust::Remote,
        }
    }

    pub async fn execute(&self, request: CommandRequest, cancel: &CancelSignal) -> CommandResponse {
        let started = Instant::now();
        let CommandRequest {
            action,
            payload,
            options,
            config,
        } = request;
        let payload_for_meta = payload.clone();

        let ctx = context::CommandContext::with_trust(config, options, self.trust);
        log::debug!("Executing action {}", action.as_str());
        let outcome = self.services.route(action, payload, &ctx, cancel).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(mut outcome) => {
                outcome.meta.duration_ms = Some(duration_ms);
                log::info!("{} finished in {duration_ms}ms", action.as_str());
                CommandResponse {
                    status: CommandStatus::Ok,
                    message: None,
                    error: None,
                    hints: outcome.hints,
                    next_actions: outcome.next_actions,
                    data: outcome.data,
                    meta: outcome.meta,
                }
            }
            Err(err) => {
                let message = format!("{err:#}");
                let classification = classify_error(&err, Some(action), Some(&payload_for_meta));
                log::warn!(
                    "{} failed ({}): {message}",
                    action.as_str(),
                    classification.code
                );
                let error = ErrorEnvelope {
                    code: classification.code,
                    message: message.clone(),
                    details: None,
                    hint: classification.hint,
                    next_actions: classification.next_actions.clone(),
                };

                CommandResponse {
                    status: CommandStatus::Error,
                    message: Some(message),
                    error: Some(error),
                    hints: classification.hints,
                    next_actions: classification.next_actions,
                    data: serde_json::Value::Null,
                    meta: ResponseMeta {
                        duration_ms: Some(duration_ms),
                        ..Default::default()
                    },
                }
            }
        }
    }
}

impl Default for CommandHandler {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn execute(request: CommandRequest, cancel: &CancelSignal) -> CommandResponse {
    CommandHandler::new().execute(request, cancel).await
}
