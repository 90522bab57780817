use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Ambiguous selector: {0}")]
    AmbiguousMatch(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Element is detached from the document: {0}")]
    ElementDetached(String),

    #[error("Element is not visible: {0}")]
    ElementNotVisible(String),

    #[error("Page session unreachable: {0}")]
    SessionUnreachable(String),

    #[error("Page error: {0}")]
    PageError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
