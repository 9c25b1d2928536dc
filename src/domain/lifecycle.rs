//! Campaign and recipient state transitions.
//!
//! ```text
//! draft ──schedule──▶ scheduled ──launch──▶ running ◀──run── paused
//!   └───────────launch──────────────────────▶ │ ──pause──▶ ┘
//!                                             └──complete──▶ completed
//! ```
//!
//! These rules are pure; services apply them with conditional updates so a
//! concurrent change to the same row loses instead of overwriting.

use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{CampaignStatus, RecipientStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignAction {
    Launch,
    Pause,
    Run,
    Schedule,
    Complete,
}

impl CampaignAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignAction::Launch => "launch",
            CampaignAction::Pause => "pause",
            CampaignAction::Run => "run",
            CampaignAction::Schedule => "schedule",
            CampaignAction::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move to a new status. `snapshot` is set when recipients must be
    /// materialized as part of the move.
    To {
        status: CampaignStatus,
        snapshot: bool,
    },
    /// Already in the requested state
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Cannot {} a campaign that is {from}", .action.as_str())]
pub struct TransitionError {
    pub from: CampaignStatus,
    pub action: CampaignAction,
}

impl From<TransitionError> for AppError {
    fn from(error: TransitionError) -> Self {
        AppError::bad_request(error.to_string())
    }
}

fn to(status: CampaignStatus) -> Transition {
    Transition::To {
        status,
        snapshot: false,
    }
}

pub fn transition(
    from: CampaignStatus,
    action: CampaignAction,
) -> Result<Transition, TransitionError> {
    use CampaignAction as A;
    use CampaignStatus as S;

    let next = match (action, from) {
        (A::Launch, S::Draft | S::Scheduled) => Transition::To {
            status: S::Running,
            snapshot: true,
        },
        (A::Launch, S::Paused) => to(S::Running),
        (A::Launch, S::Running) => Transition::Unchanged,

        (A::Pause, S::Running) => to(S::Paused),
        (A::Pause, S::Paused) => Transition::Unchanged,

        (A::Run, S::Paused) => to(S::Running),
        (A::Run, S::Running) => Transition::Unchanged,

        (A::Schedule, S::Draft | S::Scheduled) => to(S::Scheduled),

        (A::Complete, S::Completed) => Transition::Unchanged,
        (A::Complete, _) => to(S::Completed),

        _ => return Err(TransitionError { from, action }),
    };
    Ok(next)
}

/// References a campaign must carry before it can launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchRefs {
    pub template_id: Uuid,
    pub upload_id: Uuid,
    pub google_account_id: Uuid,
}

impl LaunchRefs {
    pub fn require(
        template_id: Option<Uuid>,
        upload_id: Option<Uuid>,
        google_account_id: Option<Uuid>,
    ) -> Result<Self, AppError> {
        match (template_id, upload_id, google_account_id) {
            (Some(template_id), Some(upload_id), Some(google_account_id)) => Ok(Self {
                template_id,
                upload_id,
                google_account_id,
            }),
            _ => {
                let missing: Vec<&str> = [
                    ("template_id", template_id.is_none()),
                    ("upload_id", upload_id.is_none()),
                    ("google_account_id", google_account_id.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
                Err(AppError::bad_request(format!(
                    "Campaign cannot launch without {}",
                    missing.join(", ")
                )))
            }
        }
    }
}

/// A recipient is claimed into `sending` before its send and settled right
/// after it. An unsent claim may be released back to `pending`; `sent` and
/// `failed` are terminal.
pub fn recipient_can_move(from: RecipientStatus, to: RecipientStatus) -> bool {
    use RecipientStatus as R;
    matches!(
        (from, to),
        (R::Pending, R::Sending)
            | (R::Sending, R::Sent)
            | (R::Sending, R::Failed)
            | (R::Sending, R::Pending)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use CampaignAction as A;
    use CampaignStatus as S;

    const ALL: [CampaignStatus; 5] = [S::Draft, S::Scheduled, S::Running, S::Paused, S::Completed];

    #[test]
    fn first_launch_snapshots_recipients() {
        for from in [S::Draft, S::Scheduled] {
            assert_eq!(
                transition(from, A::Launch),
                Ok(Transition::To {
                    status: S::Running,
                    snapshot: true
                })
            );
        }
    }

    #[test]
    fn relaunch_never_snapshots_again() {
        assert_eq!(transition(S::Running, A::Launch), Ok(Transition::Unchanged));
        assert_eq!(transition(S::Paused, A::Launch), Ok(to(S::Running)));
    }

    #[test]
    fn completed_is_terminal() {
        for action in [A::Launch, A::Pause, A::Run, A::Schedule] {
            assert!(transition(S::Completed, action).is_err());
        }
        assert_eq!(transition(S::Completed, A::Complete), Ok(Transition::Unchanged));
    }

    #[test]
    fn pause_and_run_toggle() {
        assert_eq!(transition(S::Running, A::Pause), Ok(to(S::Paused)));
        assert_eq!(transition(S::Paused, A::Run), Ok(to(S::Running)));
        assert!(transition(S::Draft, A::Pause).is_err());
        assert!(transition(S::Draft, A::Run).is_err());
        assert!(transition(S::Scheduled, A::Run).is_err());
    }

    #[test]
    fn schedule_only_before_launch() {
        assert_eq!(transition(S::Draft, A::Schedule), Ok(to(S::Scheduled)));
        assert_eq!(transition(S::Scheduled, A::Schedule), Ok(to(S::Scheduled)));
        assert!(transition(S::Running, A::Schedule).is_err());
        assert!(transition(S::Paused, A::Schedule).is_err());
    }

    #[test]
    fn every_open_state_can_complete() {
        for from in ALL.into_iter().filter(|s| *s != S::Completed) {
            assert_eq!(transition(from, A::Complete), Ok(to(S::Completed)));
        }
    }

    #[test]
    fn error_names_state_and_action() {
        let err = transition(S::Completed, A::Launch).unwrap_err();
        assert_eq!(err.to_string(), "Cannot launch a campaign that is completed");
        assert!(matches!(AppError::from(err), AppError::BadRequest { .. }));
    }

    #[test]
    fn launch_requires_all_refs() {
        let id = Uuid::new_v4();
        assert!(LaunchRefs::require(Some(id), Some(id), Some(id)).is_ok());
        match LaunchRefs::require(Some(id), None, None) {
            Err(AppError::BadRequest { message }) => {
                assert!(message.contains("upload_id, google_account_id"))
            }
            other => panic!("expected BadRequest, got {:?}", other),
        }
    }

    #[test]
    fn recipient_failure_is_terminal() {
        use RecipientStatus as R;
        assert!(!recipient_can_move(R::Failed, R::Pending));
        assert!(!recipient_can_move(R::Failed, R::Sent));
        assert!(!recipient_can_move(R::Sent, R::Failed));
        assert!(!recipient_can_move(R::Sent, R::Pending));
    }

    #[test]
    fn recipients_are_claimed_before_settling() {
        use RecipientStatus as R;
        assert!(recipient_can_move(R::Pending, R::Sending));
        assert!(recipient_can_move(R::Sending, R::Sent));
        assert!(recipient_can_move(R::Sending, R::Failed));
        assert!(recipient_can_move(R::Sending, R::Pending));
        assert!(!recipient_can_move(R::Pending, R::Sent));
        assert!(!recipient_can_move(R::Pending, R::Failed));
        assert!(!recipient_can_move(R::Sending, R::Sending));
    }
}
