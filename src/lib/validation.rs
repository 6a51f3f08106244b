//! Input validation utilities
//!
//! Common validation functions for sorter parameters with consistent error
//! messages. All functions use the structured error types from
//! [`crate::errors`] and are checked before any data movement, so a
//! validation failure always leaves the caller's arrays untouched.

use crate::errors::{Result, SortError};

/// Validate that the block size is usable (at least one element).
pub fn validate_block_size(block_size: usize) -> Result<()> {
    if block_size == 0 {
        return Err(SortError::InvalidParameter {
            parameter: "block_size".to_string(),
            reason: "must be >= 1".to_string(),
        });
    }
    Ok(())
}

/// Validate that a key array and a value array describe the same elements.
pub fn validate_paired_lengths(keys: usize, values: usize) -> Result<()> {
    if keys != values {
        return Err(SortError::InvalidParameter {
            parameter: "values".to_string(),
            reason: format!("length {values} does not match {keys} keys"),
        });
    }
    Ok(())
}

/// Validate chunked storage geometry: every chunk holds exactly `block_size`
/// elements except the last, which holds the (non-empty) remainder.
///
/// Returns the total element count.
pub fn validate_chunk_geometry(lens: &[usize], block_size: usize) -> Result<usize> {
    validate_block_size(block_size)?;
    for (i, &len) in lens.iter().enumerate() {
        let last = i + 1 == lens.len();
        if !last && len != block_size {
            return Err(SortError::InvalidParameter {
                parameter: "chunks".to_string(),
                reason: format!("chunk {i} holds {len} elements, expected {block_size}"),
            });
        }
        if last && (len == 0 || len > block_size) {
            return Err(SortError::InvalidParameter {
                parameter: "chunks".to_string(),
                reason: format!("last chunk holds {len} elements, expected 1..={block_size}"),
            });
        }
    }
    Ok(lens.iter().sum())
}

/// Validate that key chunks and value chunks pair up one to one.
pub fn validate_matching_chunks(key_lens: &[usize], value_lens: &[usize]) -> Result<()> {
    if key_lens.len() != value_lens.len() {
        return Err(SortError::InvalidParameter {
            parameter: "value_chunks".to_string(),
            reason: format!(
                "{} chunks do not match {} key chunks",
                value_lens.len(),
                key_lens.len()
            ),
        });
    }
    for (i, (&kl, &vl)) in key_lens.iter().zip(value_lens.iter()).enumerate() {
        if kl != vl {
            return Err(SortError::InvalidParameter {
                parameter: "value_chunks".to_string(),
                reason: format!("chunk {i} holds {vl} values for {kl} keys"),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_size() {
        assert!(validate_block_size(0).is_err());
        assert!(validate_block_size(1).is_ok());
        assert!(validate_block_size(1 << 20).is_ok());
    }

    #[test]
    fn test_paired_lengths() {
        assert!(validate_paired_lengths(10, 10).is_ok());
        let err = validate_paired_lengths(10, 9).unwrap_err();
        assert!(format!("{err}").contains("does not match"));
    }

    #[test]
    fn test_chunk_geometry() {
        assert_eq!(validate_chunk_geometry(&[4, 4, 2], 4).unwrap(), 10);
        assert_eq!(validate_chunk_geometry(&[4], 4).unwrap(), 4);
        assert_eq!(validate_chunk_geometry(&[3], 4).unwrap(), 3);
        assert_eq!(validate_chunk_geometry(&[], 4).unwrap(), 0);

        // Interior chunk with the wrong capacity
        assert!(validate_chunk_geometry(&[4, 3, 2], 4).is_err());
        // Empty or oversized trailing chunk
        assert!(validate_chunk_geometry(&[4, 0], 4).is_err());
        assert!(validate_chunk_geometry(&[4, 5], 4).is_err());
    }

    #[test]
    fn test_matching_chunks() {
        assert!(validate_matching_chunks(&[4, 4, 2], &[4, 4, 2]).is_ok());
        assert!(validate_matching_chunks(&[4, 4], &[4]).is_err());
        assert!(validate_matching_chunks(&[4, 2], &[4, 3]).is_err());
    }
}
