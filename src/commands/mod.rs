// commands/mod.rs
mod payload;
mod resolver;
mod shapes;

pub use payload::{
    ClimateSetPoint, CommandValue, DailyClimateSchedule, ExplicitTeachIn, HsbColor, RgbColor,
};
pub use resolver::{NoMatch, NoMatchReason, Resolution, resolve};
pub use shapes::{ParseFn, Shape, ShapeMismatch, ShapeSet, ShapeSetError, priority};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    error::AppError,
    metrics::{self, CommandOutcome},
};

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("device {0} is not registered")]
    UnknownDevice(String),
    #[error("device {device} does not support command {command}")]
    UnsupportedCommand { device: String, command: String },
    #[error("command rejected: {0}")]
    Rejected(String),
}

/// Runs a resolved command against a device.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(
        &self,
        device_id: &str,
        command: &str,
        args: Vec<CommandValue>,
    ) -> Result<(), ExecutorError>;
}

#[derive(Debug, Clone, Copy)]
pub struct CommandRequest<'a> {
    pub device_id: &'a str,
    pub command: &'a str,
    pub parameters: Option<&'a [u8]>,
}

/// Resolves the request parameters and invokes the executor exactly once.
pub async fn dispatch(
    executor: &dyn CommandExecutor,
    shapes: &[Shape],
    request: CommandRequest<'_>,
) -> Result<(), AppError> {
    let resolution = resolve(request.parameters, shapes).inspect_err(|no_match| {
        warn!(
            device_id = request.device_id,
            command = request.command,
            reason = %no_match.reason,
            "Command parameters not resolved"
        );
        metrics::record_command(CommandOutcome::NoMatch);
    })?;

    let shape = resolution.shape().unwrap_or("none");
    match executor
        .execute(request.device_id, request.command, resolution.into_args())
        .await
    {
        Ok(()) => {
            info!(
                device_id = request.device_id,
                command = request.command,
                shape,
                "Command executed"
            );
            metrics::record_command(CommandOutcome::Executed);
            Ok(())
        }
        Err(e) => {
            warn!(
                device_id = request.device_id,
                command = request.command,
                shape,
                error = %e,
                "Command execution failed"
            );
            metrics::record_command(CommandOutcome::Rejected);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingExecutor {
        calls: Mutex<Vec<(String, String, Vec<CommandValue>)>>,
        fail: bool,
    }

    #[async_trait]
    impl CommandExecutor for RecordingExecutor {
        async fn execute(
            &self,
            device_id: &str,
            command: &str,
            args: Vec<CommandValue>,
        ) -> Result<(), ExecutorError> {
            self.calls
                .lock()
                .unwrap()
                .push((device_id.to_string(), command.to_string(), args));
            if self.fail {
                Err(ExecutorError::Rejected("offline".into()))
            } else {
                Ok(())
            }
        }
    }

    fn request<'a>(parameters: Option<&'a [u8]>) -> CommandRequest<'a> {
        CommandRequest {
            device_id: "thermostat",
            command: "setTemperatureAt",
            parameters,
        }
    }

    #[tokio::test]
    async fn no_parameters_run_with_zero_args() {
        let executor = RecordingExecutor::default();
        let shapes = ShapeSet::registered().unwrap();
        dispatch(&executor, &shapes, request(None)).await.unwrap();

        let calls = executor.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].2.is_empty());
    }

    #[tokio::test]
    async fn resolved_value_is_passed_once() {
        let executor = RecordingExecutor::default();
        let shapes = ShapeSet::registered().unwrap();
        let body = r#"{"value": "21 °C"}"#.as_bytes();
        dispatch(&executor, &shapes, request(Some(body)))
            .await
            .unwrap();

        let calls = executor.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "thermostat");
        assert!(matches!(calls[0].2.as_slice(), [CommandValue::Measurement(m)] if m.unit() == "°C"));
    }

    #[tokio::test]
    async fn unresolved_parameters_never_reach_the_executor() {
        let executor = RecordingExecutor::default();
        let shapes = ShapeSet::registered().unwrap();
        let result = dispatch(&executor, &shapes, request(Some(b"{oops".as_slice()))).await;

        assert!(matches!(result, Err(AppError::CommandNotResolved(_))));
        assert!(executor.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn executor_failures_surface_as_command_failures() {
        let executor = RecordingExecutor {
            fail: true,
            ..Default::default()
        };
        let shapes = ShapeSet::registered().unwrap();
        let result = dispatch(&executor, &shapes, request(None)).await;

        assert!(matches!(result, Err(AppError::CommandFailed(ExecutorError::Rejected(_)))));
    }
}
