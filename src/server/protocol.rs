//! Control socket wire format
//!
//! One JSON object per line in each direction.
//!
//! ```text
//! → {"method":"perform_action","controller":"vdisplay","action":"ATTACH",
//!    "args":{"PARENT_SURFACE":{"surface_control":12}}}
//! ← {"status":"ok","result":true}
//! → {"method":"add_callback"}
//! ← {"status":"ok"}
//! ← {"event":{"type":"display_added","display_id":2}}
//! ```

use serde::{Deserialize, Serialize};

use crate::controller::ActionArgs;
use crate::service::{ActionError, ServiceEvent};

/// Client request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Request {
    /// Run an action on a controller
    PerformAction {
        /// Controller name
        controller: String,
        /// Action name
        action: String,
        /// Action arguments
        #[serde(default)]
        args: ActionArgs,
    },
    /// Subscribe this connection to service events
    AddCallback,
    /// Unsubscribe this connection
    RemoveCallback,
}

/// Declared failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No controller under that name
    UnknownController,
    /// Controller does not declare the action
    UnsupportedAction,
    /// Request line could not be parsed
    BadRequest,
    /// The broker failed while handling the request
    Internal,
}

/// Reply to one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// Call succeeded
    Ok {
        /// Controller result, for `perform_action`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<bool>,
    },
    /// Call failed
    Error {
        /// Failure kind
        kind: ErrorKind,
        /// Human-readable detail
        message: String,
    },
}

impl Response {
    /// Success with a controller result
    pub fn result(result: bool) -> Self {
        Response::Ok {
            result: Some(result),
        }
    }

    /// Success without a payload
    pub fn ok() -> Self {
        Response::Ok { result: None }
    }

    /// Failure
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Response::Error {
            kind,
            message: message.into(),
        }
    }
}

impl From<ActionError> for Response {
    fn from(e: ActionError) -> Self {
        let kind = match e {
            ActionError::UnknownController(_) => ErrorKind::UnknownController,
            ActionError::UnsupportedAction { .. } => ErrorKind::UnsupportedAction,
        };
        Response::error(kind, e.to_string())
    }
}

/// Asynchronous notification line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFrame {
    /// The event
    pub event: ServiceEvent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{DisplayId, SurfaceControl};

    #[test]
    fn test_parse_perform_action() {
        let line = r#"{"method":"perform_action","controller":"vdisplay","action":"ATTACH","args":{"PARENT_SURFACE":{"surface_control":12},"DISPLAY_ID":{"int":0}}}"#;
        let request: Request = serde_json::from_str(line).unwrap();

        let Request::PerformAction {
            controller,
            action,
            args,
        } = request
        else {
            panic!("expected perform_action");
        };
        assert_eq!(controller, "vdisplay");
        assert_eq!(action, "ATTACH");
        assert_eq!(
            args.get_surface_control("PARENT_SURFACE"),
            Some(SurfaceControl(12))
        );
        assert_eq!(args.get_int("DISPLAY_ID"), Some(0));
    }

    #[test]
    fn test_args_default_to_empty() {
        let request: Request =
            serde_json::from_str(r#"{"method":"perform_action","controller":"vdisplay","action":"CREATE"}"#)
                .unwrap();
        assert!(matches!(request, Request::PerformAction { args, .. } if args.is_empty()));
    }

    #[test]
    fn test_callback_requests() {
        let add: Request = serde_json::from_str(r#"{"method":"add_callback"}"#).unwrap();
        let remove: Request = serde_json::from_str(r#"{"method":"remove_callback"}"#).unwrap();
        assert_eq!(add, Request::AddCallback);
        assert_eq!(remove, Request::RemoveCallback);
    }

    #[test]
    fn test_unknown_method_rejected() {
        assert!(serde_json::from_str::<Request>(r#"{"method":"shutdown"}"#).is_err());
    }

    #[test]
    fn test_response_shapes() {
        assert_eq!(
            serde_json::to_string(&Response::result(true)).unwrap(),
            r#"{"status":"ok","result":true}"#
        );
        assert_eq!(
            serde_json::to_string(&Response::ok()).unwrap(),
            r#"{"status":"ok"}"#
        );

        let error: Response = ActionError::UnknownController("nope".to_string()).into();
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            serde_json::json!({
                "status": "error",
                "kind": "unknown_controller",
                "message": "Unknown controller nope",
            })
        );
    }

    #[test]
    fn test_event_frame_shape() {
        let frame = EventFrame {
            event: ServiceEvent::DisplayRemoved {
                display_id: DisplayId(3),
            },
        };
        assert_eq!(
            serde_json::to_string(&frame).unwrap(),
            r#"{"event":{"type":"display_removed","display_id":3}}"#
        );
    }
}
