//! Utility functions

use crate::error::{Result, StitchError};
use std::mem;

/// Convert raw little-endian bytes to typed data
pub fn bytes_to_typed_data<T: Copy>(bytes: &[u8]) -> Result<Vec<T>> {
    let elem = mem::size_of::<T>();
    if bytes.len() % elem != 0 {
        return Err(StitchError::InvalidFormat(format!(
            "byte length {} not aligned with element size {}",
            bytes.len(),
            elem
        )));
    }

    let count = bytes.len() / elem;
    let mut data: Vec<T> = Vec::with_capacity(count);

    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), data.as_mut_ptr() as *mut u8, bytes.len());
        data.set_len(count);
    }

    Ok(data)
}

/// Convert typed data to raw bytes
pub fn typed_data_to_bytes<T: Copy>(data: &[T]) -> Vec<u8> {
    let byte_len = std::mem::size_of_val(data);
    let mut bytes: Vec<u8> = Vec::with_capacity(byte_len);

    unsafe {
        std::ptr::copy_nonoverlapping(data.as_ptr() as *const u8, bytes.as_mut_ptr(), byte_len);
        bytes.set_len(byte_len);
    }

    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_conversion_roundtrip() {
        let data: Vec<u16> = vec![7, 512, 4096, 65535];
        let bytes = typed_data_to_bytes(&data);
        assert_eq!(bytes.len(), data.len() * 2);

        let recovered: Vec<u16> = bytes_to_typed_data(&bytes).unwrap();
        assert_eq!(data, recovered);
    }

    #[test]
    fn test_bytes_conversion_misaligned() {
        let bytes = [0u8, 1, 2];
        let err = bytes_to_typed_data::<u16>(&bytes).unwrap_err();
        assert!(matches!(err, StitchError::InvalidFormat(_)));
    }
}
