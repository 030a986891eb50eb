//! Scan filter values
//!
//! Equality filters compare raw bytes at an offset. Everything a caller may
//! compare against is normalised to those bytes here: integers little-endian,
//! keys as their 32 raw bytes, base58 strings decoded.

use solana_sdk::pubkey::Pubkey;

use crate::rpc::RpcManagerError;

/// Value of a byte-offset equality filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Bytes(Vec<u8>),
    Pubkey(Pubkey),
    /// Base58 text, decoded before comparison
    Base58(String),
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I64(i64),
    /// Unsigned integer stored in `width` little-endian bytes (1..=16)
    Uint { value: u128, width: usize },
}

impl FilterValue {
    pub fn base58(value: impl Into<String>) -> Self {
        FilterValue::Base58(value.into())
    }

    pub fn uint(value: u128, width: usize) -> Self {
        FilterValue::Uint { value, width }
    }

    /// Raw bytes the account data must contain at the filter offset
    pub fn to_bytes(&self) -> Result<Vec<u8>, RpcManagerError> {
        let bytes = match self {
            FilterValue::Bytes(bytes) => bytes.clone(),
            FilterValue::Pubkey(key) => key.to_bytes().to_vec(),
            FilterValue::Base58(text) => bs58::decode(text).into_vec().map_err(|err| {
                RpcManagerError::Validation(format!("invalid base58 filter value {:?}: {}", text, err))
            })?,
            FilterValue::Bool(flag) => vec![u8::from(*flag)],
            FilterValue::U8(v) => vec![*v],
            FilterValue::U16(v) => v.to_le_bytes().to_vec(),
            FilterValue::U32(v) => v.to_le_bytes().to_vec(),
            FilterValue::U64(v) => v.to_le_bytes().to_vec(),
            FilterValue::I64(v) => v.to_le_bytes().to_vec(),
            FilterValue::Uint { value, width } => uint_le_bytes(*value, *width)?,
        };

        if bytes.is_empty() {
            return Err(RpcManagerError::Validation(
                "filter value encodes to zero bytes".to_string(),
            ));
        }
        Ok(bytes)
    }
}

fn uint_le_bytes(value: u128, width: usize) -> Result<Vec<u8>, RpcManagerError> {
    if !(1..=16).contains(&width) {
        return Err(RpcManagerError::Validation(format!(
            "integer filter width must be 1..=16 bytes, got {}",
            width
        )));
    }
    if width < 16 && value >> (width * 8) != 0 {
        return Err(RpcManagerError::Validation(format!(
            "value {} does not fit in {} bytes",
            value, width
        )));
    }
    Ok(value.to_le_bytes()[..width].to_vec())
}

impl From<Vec<u8>> for FilterValue {
    fn from(bytes: Vec<u8>) -> Self {
        FilterValue::Bytes(bytes)
    }
}

impl From<&[u8]> for FilterValue {
    fn from(bytes: &[u8]) -> Self {
        FilterValue::Bytes(bytes.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for FilterValue {
    fn from(bytes: [u8; N]) -> Self {
        FilterValue::Bytes(bytes.to_vec())
    }
}

impl From<Pubkey> for FilterValue {
    fn from(key: Pubkey) -> Self {
        FilterValue::Pubkey(key)
    }
}

impl From<&Pubkey> for FilterValue {
    fn from(key: &Pubkey) -> Self {
        FilterValue::Pubkey(*key)
    }
}

impl From<bool> for FilterValue {
    fn from(flag: bool) -> Self {
        FilterValue::Bool(flag)
    }
}

impl From<u8> for FilterValue {
    fn from(v: u8) -> Self {
        FilterValue::U8(v)
    }
}

impl From<u16> for FilterValue {
    fn from(v: u16) -> Self {
        FilterValue::U16(v)
    }
}

impl From<u32> for FilterValue {
    fn from(v: u32) -> Self {
        FilterValue::U32(v)
    }
}

impl From<u64> for FilterValue {
    fn from(v: u64) -> Self {
        FilterValue::U64(v)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        FilterValue::I64(v)
    }
}
