use thiserror::Error;

use crate::document::ElementId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomError {
    #[error("No such element: {0}")]
    NoSuchElement(ElementId),

    #[error("Element {0} has no parent")]
    Detached(ElementId),
}
