// Persisted values go through bincode 2.0 with the standard configuration
use crate::error::{Result, TangleError};

pub fn serialize<T: bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    bincode::encode_to_vec(data, config)
        .map_err(|e| TangleError::Serialization(format!("Serialization failed: {e}")))
}

pub fn deserialize<T>(bytes: &[u8]) -> Result<T>
where
    T: bincode::Decode<()>,
{
    let config = bincode::config::standard();
    let (data, _) = bincode::decode_from_slice(bytes, config)
        .map_err(|e| TangleError::Serialization(format!("Deserialization failed: {e}")))?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_values_survive() {
        for value in [0i64, -50, i64::MAX, i64::MIN] {
            let bytes = serialize(&value).expect("Serialization should work");
            let back: i64 = deserialize(&bytes).expect("Deserialization should work");
            assert_eq!(value, back);
        }
    }

    #[test]
    fn test_deserialize_invalid_data() {
        let result: Result<Vec<u8>> = deserialize(&[0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(result.is_err());
    }
}
