use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReorderError {
    #[error("index {index} out of range for list of {len}")]
    OutOfRange { index: usize, len: usize },
}

/// Drag-and-drop move: takes the element at `from` out and reinserts it at
/// `to`. The list is left untouched when either index is out of range.
pub fn move_item<T>(list: &mut Vec<T>, from: usize, to: usize) -> Result<(), ReorderError> {
    let len = list.len();
    for index in [from, to] {
        if index >= len {
            return Err(ReorderError::OutOfRange { index, len });
        }
    }
    if from != to {
        let item = list.remove(from);
        list.insert(to, item);
    }
    Ok(())
}
