//! Appointment status transitions.
//!
//! Pure decision logic with no persistence or permission checks. Every action has a
//! `can_*` predicate and a transition method that moves the machine on or fails with
//! [`WorkflowError::InvalidStatus`] naming the status it tried to reach.

use crate::constants::permissions;
use crate::models::{AppointmentStatusName, StepName};
use crate::{WorkflowError, WorkflowResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use AppointmentStatusName::*;

/// Something a user can do to an appointment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentAction {
    CheckIn,
    Cancel,
    MarkDidNotAttend,
    Start,
    ConfirmIdentity,
    ReviewMedicalInformation,
    TakeImages,
    Screen,
    PartialScreen,
    Pause,
    Resume,
    MarkAttendedNotScreened,
}

impl AppointmentAction {
    pub const ALL: [AppointmentAction; 12] = [
        AppointmentAction::CheckIn,
        AppointmentAction::Cancel,
        AppointmentAction::MarkDidNotAttend,
        AppointmentAction::Start,
        AppointmentAction::ConfirmIdentity,
        AppointmentAction::ReviewMedicalInformation,
        AppointmentAction::TakeImages,
        AppointmentAction::Screen,
        AppointmentAction::PartialScreen,
        AppointmentAction::Pause,
        AppointmentAction::Resume,
        AppointmentAction::MarkAttendedNotScreened,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentAction::CheckIn => "check_in",
            AppointmentAction::Cancel => "cancel",
            AppointmentAction::MarkDidNotAttend => "mark_did_not_attend",
            AppointmentAction::Start => "start",
            AppointmentAction::ConfirmIdentity => "confirm_identity",
            AppointmentAction::ReviewMedicalInformation => "review_medical_information",
            AppointmentAction::TakeImages => "take_images",
            AppointmentAction::Screen => "screen",
            AppointmentAction::PartialScreen => "partial_screen",
            AppointmentAction::Pause => "pause",
            AppointmentAction::Resume => "resume",
            AppointmentAction::MarkAttendedNotScreened => "mark_attended_not_screened",
        }
    }

    /// The permission a user needs to perform this action.
    pub fn permission(&self) -> &'static str {
        match self {
            AppointmentAction::CheckIn
            | AppointmentAction::Cancel
            | AppointmentAction::MarkDidNotAttend => permissions::MANAGE_APPOINTMENTS,
            _ => permissions::PERFORM_MAMMOGRAM_APPOINTMENT,
        }
    }

    /// The ledger step this action completes, if any.
    pub fn step(&self) -> Option<StepName> {
        match self {
            AppointmentAction::ConfirmIdentity => Some(StepName::ConfirmIdentity),
            AppointmentAction::ReviewMedicalInformation => {
                Some(StepName::ReviewMedicalInformation)
            }
            AppointmentAction::TakeImages => Some(StepName::TakeImages),
            AppointmentAction::Screen | AppointmentAction::PartialScreen => {
                Some(StepName::CheckInformation)
            }
            _ => None,
        }
    }
}

impl fmt::Display for AppointmentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentAction {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppointmentAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| WorkflowError::UnknownTag {
                kind: "appointment action",
                tag: s.to_owned(),
            })
    }
}

/// Decides which transitions are legal from a given status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppointmentStateMachine {
    state: AppointmentStatusName,
    effective: AppointmentStatusName,
    identity_check_invalid: bool,
}

impl AppointmentStateMachine {
    /// `identity_check_invalid` is set when the current user is not the one who last
    /// confirmed the participant's identity.
    pub fn new(state: AppointmentStatusName, identity_check_invalid: bool) -> Self {
        Self {
            state,
            effective: state,
            identity_check_invalid,
        }
    }

    /// Sets the status the in-appointment guards act on after a resume or takeover.
    pub fn with_effective_state(mut self, effective: AppointmentStatusName) -> Self {
        self.effective = effective;
        self
    }

    pub fn state(&self) -> AppointmentStatusName {
        self.state
    }

    pub fn effective_state(&self) -> AppointmentStatusName {
        self.effective
    }

    pub fn identity_check_invalid(&self) -> bool {
        self.identity_check_invalid
    }

    pub fn can_check_in(&self) -> bool {
        self.state == Scheduled
    }

    pub fn can_cancel(&self) -> bool {
        self.state == Scheduled
    }

    pub fn can_mark_did_not_attend(&self) -> bool {
        self.state == Scheduled
    }

    pub fn can_start(&self) -> bool {
        matches!(self.state, Scheduled | CheckedIn)
    }

    pub fn can_confirm_identity(&self) -> bool {
        self.effective == InProgress
            || (matches!(self.state, Paused | TakenOver) && self.identity_check_invalid)
    }

    pub fn can_review_medical_information(&self) -> bool {
        self.effective == IdentityConfirmed && !self.identity_check_invalid
    }

    pub fn can_take_images(&self) -> bool {
        self.effective == MedicalInformationReviewed && !self.identity_check_invalid
    }

    pub fn can_screen(&self) -> bool {
        self.effective == ImagesTaken && !self.identity_check_invalid
    }

    pub fn can_pause(&self) -> bool {
        self.effective.is_in_progress() && !self.identity_check_invalid
    }

    pub fn can_resume(&self) -> bool {
        self.state == Paused
    }

    pub fn can_mark_attended_not_screened(&self) -> bool {
        self.effective.is_in_progress() && !self.identity_check_invalid
    }

    pub fn can(&self, action: AppointmentAction) -> bool {
        match action {
            AppointmentAction::CheckIn => self.can_check_in(),
            AppointmentAction::Cancel => self.can_cancel(),
            AppointmentAction::MarkDidNotAttend => self.can_mark_did_not_attend(),
            AppointmentAction::Start => self.can_start(),
            AppointmentAction::ConfirmIdentity => self.can_confirm_identity(),
            AppointmentAction::ReviewMedicalInformation => self.can_review_medical_information(),
            AppointmentAction::TakeImages => self.can_take_images(),
            AppointmentAction::Screen | AppointmentAction::PartialScreen => self.can_screen(),
            AppointmentAction::Pause => self.can_pause(),
            AppointmentAction::Resume => self.can_resume(),
            AppointmentAction::MarkAttendedNotScreened => self.can_mark_attended_not_screened(),
        }
    }

    /// True when `action` may be completed again on the ledger without a new status row.
    ///
    /// This happens after a takeover: the status was entered by the previous clinician and
    /// cannot be entered twice, but the step is current for the user who took over.
    pub fn can_recomplete(&self, action: AppointmentAction, step_is_current: bool) -> bool {
        if !step_is_current {
            return false;
        }
        match action {
            AppointmentAction::ConfirmIdentity => self.can_confirm_identity(),
            AppointmentAction::ReviewMedicalInformation | AppointmentAction::TakeImages => {
                self.state != Paused
                    && self.effective.is_in_progress()
                    && !self.identity_check_invalid
            }
            _ => false,
        }
    }

    /// The status `action` leads to from here.
    pub fn target(&self, action: AppointmentAction) -> AppointmentStatusName {
        match action {
            AppointmentAction::CheckIn => CheckedIn,
            AppointmentAction::Cancel => Cancelled,
            AppointmentAction::MarkDidNotAttend => DidNotAttend,
            AppointmentAction::Start => InProgress,
            AppointmentAction::ConfirmIdentity => IdentityConfirmed,
            AppointmentAction::ReviewMedicalInformation => MedicalInformationReviewed,
            AppointmentAction::TakeImages => ImagesTaken,
            AppointmentAction::Screen => Screened,
            AppointmentAction::PartialScreen => PartiallyScreened,
            AppointmentAction::Pause => Paused,
            AppointmentAction::Resume if self.identity_check_invalid => TakenOver,
            AppointmentAction::Resume => Resumed,
            AppointmentAction::MarkAttendedNotScreened => AttendedNotScreened,
        }
    }

    pub fn check_in(&mut self) -> WorkflowResult<AppointmentStatusName> {
        self.perform(AppointmentAction::CheckIn)
    }

    pub fn cancel(&mut self) -> WorkflowResult<AppointmentStatusName> {
        self.perform(AppointmentAction::Cancel)
    }

    pub fn mark_did_not_attend(&mut self) -> WorkflowResult<AppointmentStatusName> {
        self.perform(AppointmentAction::MarkDidNotAttend)
    }

    pub fn start(&mut self) -> WorkflowResult<AppointmentStatusName> {
        self.perform(AppointmentAction::Start)
    }

    pub fn confirm_identity(&mut self) -> WorkflowResult<AppointmentStatusName> {
        self.perform(AppointmentAction::ConfirmIdentity)
    }

    pub fn review_medical_information(&mut self) -> WorkflowResult<AppointmentStatusName> {
        self.perform(AppointmentAction::ReviewMedicalInformation)
    }

    pub fn take_images(&mut self) -> WorkflowResult<AppointmentStatusName> {
        self.perform(AppointmentAction::TakeImages)
    }

    pub fn screen(&mut self, partial: bool) -> WorkflowResult<AppointmentStatusName> {
        if partial {
            self.perform(AppointmentAction::PartialScreen)
        } else {
            self.perform(AppointmentAction::Screen)
        }
    }

    pub fn pause(&mut self) -> WorkflowResult<AppointmentStatusName> {
        self.perform(AppointmentAction::Pause)
    }

    pub fn resume(&mut self) -> WorkflowResult<AppointmentStatusName> {
        self.perform(AppointmentAction::Resume)
    }

    pub fn mark_attended_not_screened(&mut self) -> WorkflowResult<AppointmentStatusName> {
        self.perform(AppointmentAction::MarkAttendedNotScreened)
    }

    /// Applies `action`, returning the new status.
    pub fn perform(&mut self, action: AppointmentAction) -> WorkflowResult<AppointmentStatusName> {
        let target = self.target(action);
        let allowed = self.can(action);
        tracing::debug!(
            action = action.as_str(),
            state = %self.state,
            effective = %self.effective,
            identity_check_invalid = self.identity_check_invalid,
            allowed,
            "evaluated transition guard"
        );
        if !allowed {
            return Err(WorkflowError::InvalidStatus(target));
        }

        self.state = target;
        self.effective = target;
        if action == AppointmentAction::ConfirmIdentity {
            self.identity_check_invalid = false;
        }
        Ok(target)
    }
}
