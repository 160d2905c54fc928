//! Input validation.
//!
//! Every check here runs before the engine mutates anything. Text fields are
//! trimmed first and the trimmed value is what gets measured and stored.

use crate::types::{Priority, Team, TicketType, UserId};
use crate::user::UserRole;
use thiserror::Error;

/// Minimum title length in characters.
pub const TITLE_MIN_CHARS: usize = 3;
/// Maximum title length in characters.
pub const TITLE_MAX_CHARS: usize = 255;
/// Maximum description length in characters.
pub const DESCRIPTION_MAX_CHARS: usize = 5000;
/// Maximum message length in characters.
pub const MESSAGE_MAX_CHARS: usize = 5000;
/// Maximum attachment file name length in characters.
pub const FILENAME_MAX_CHARS: usize = 255;

/// Malformed input or a disallowed combination of values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Title shorter than [`TITLE_MIN_CHARS`] after trimming.
    #[error("title must be at least {limit} characters, got {0}", limit = TITLE_MIN_CHARS)]
    TitleTooShort(usize),

    /// Title longer than [`TITLE_MAX_CHARS`].
    #[error("title must be at most {limit} characters, got {0}", limit = TITLE_MAX_CHARS)]
    TitleTooLong(usize),

    /// Description longer than [`DESCRIPTION_MAX_CHARS`].
    #[error("description must be at most {limit} characters, got {0}", limit = DESCRIPTION_MAX_CHARS)]
    DescriptionTooLong(usize),

    /// Priority not allowed for the ticket type.
    #[error("priority {priority} is not allowed for {ticket_type} tickets")]
    PriorityNotAllowed {
        /// Requested priority.
        priority: Priority,
        /// Ticket type.
        ticket_type: TicketType,
    },

    /// Message content blank after trimming.
    #[error("message content must not be blank")]
    EmptyMessage,

    /// Message longer than [`MESSAGE_MAX_CHARS`].
    #[error("message must be at most {limit} characters, got {0}", limit = MESSAGE_MAX_CHARS)]
    MessageTooLong(usize),

    /// Attachment file name blank after trimming.
    #[error("attachment file name must not be blank")]
    EmptyFilename,

    /// Attachment file name longer than [`FILENAME_MAX_CHARS`].
    #[error("attachment file name must be at most {limit} characters, got {0}", limit = FILENAME_MAX_CHARS)]
    FilenameTooLong(usize),

    /// Attachment URL blank after trimming.
    #[error("attachment URL must not be blank")]
    EmptyFileUrl,

    /// Target user cannot hold tickets.
    #[error("user {user_id} cannot be assigned tickets: {reason}")]
    AssigneeNotEligible {
        /// Target user.
        user_id: UserId,
        /// Why the user was refused.
        reason: &'static str,
    },

    /// Target user's role does not fit the ticket's team.
    #[error("team {team} does not accept users with role {role}")]
    TeamMismatch {
        /// The ticket's team.
        team: Team,
        /// The target user's role.
        role: UserRole,
    },

    /// The submitting account is not active.
    #[error("user {0} is not active and cannot submit tickets")]
    InactiveCreator(UserId),
}

/// Validates and trims a ticket title.
///
/// # Errors
///
/// Returns [`ValidationError::TitleTooShort`] or [`ValidationError::TitleTooLong`].
pub fn validate_title(title: &str) -> Result<String, ValidationError> {
    let title = title.trim();
    let len = title.chars().count();
    if len < TITLE_MIN_CHARS {
        return Err(ValidationError::TitleTooShort(len));
    }
    if len > TITLE_MAX_CHARS {
        return Err(ValidationError::TitleTooLong(len));
    }
    Ok(title.to_string())
}

/// Validates and trims a ticket description. Empty is fine.
///
/// # Errors
///
/// Returns [`ValidationError::DescriptionTooLong`].
pub fn validate_description(description: &str) -> Result<String, ValidationError> {
    let description = description.trim();
    let len = description.chars().count();
    if len > DESCRIPTION_MAX_CHARS {
        return Err(ValidationError::DescriptionTooLong(len));
    }
    Ok(description.to_string())
}

/// Rejects priority/type pairs that make no sense.
///
/// Feature requests are never critical, and incidents are never low priority.
///
/// # Errors
///
/// Returns [`ValidationError::PriorityNotAllowed`].
pub fn validate_priority_for_type(
    priority: Priority,
    ticket_type: TicketType,
) -> Result<(), ValidationError> {
    match (ticket_type, priority) {
        (TicketType::FeatureRequest, Priority::Critical) | (TicketType::Incident, Priority::Low) => {
            Err(ValidationError::PriorityNotAllowed {
                priority,
                ticket_type,
            })
        }
        _ => Ok(()),
    }
}

/// Validates and trims message content.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyMessage`] or [`ValidationError::MessageTooLong`].
pub fn validate_message(content: &str) -> Result<String, ValidationError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    let len = content.chars().count();
    if len > MESSAGE_MAX_CHARS {
        return Err(ValidationError::MessageTooLong(len));
    }
    Ok(content.to_string())
}

/// Validates and trims attachment metadata, returning `(filename, url)`.
///
/// # Errors
///
/// Returns a filename or URL error.
pub fn validate_attachment(filename: &str, file_url: &str) -> Result<(String, String), ValidationError> {
    let filename = filename.trim();
    if filename.is_empty() {
        return Err(ValidationError::EmptyFilename);
    }
    let len = filename.chars().count();
    if len > FILENAME_MAX_CHARS {
        return Err(ValidationError::FilenameTooLong(len));
    }
    let file_url = file_url.trim();
    if file_url.is_empty() {
        return Err(ValidationError::EmptyFileUrl);
    }
    Ok((filename.to_string(), file_url.to_string()))
}
