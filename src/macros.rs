//! Extraction macros over serde_cbor values. CBOR maps arrive with mixed
//! value types, so every access point has to assert the shape it expects.

macro_rules! cbor_try_map {
    ($v:expr) => {
        match $v {
            serde_cbor::Value::Map(m) => Ok(m),
            _ => Err($crate::error::WebauthnError::CBORDecodeError(
                "value",
                "expected map".to_string(),
            )),
        }
    };
}

macro_rules! cbor_try_array {
    ($v:expr) => {
        match $v {
            serde_cbor::Value::Array(a) => Ok(a),
            _ => Err($crate::error::WebauthnError::CBORDecodeError(
                "value",
                "expected array".to_string(),
            )),
        }
    };
}

macro_rules! cbor_try_bytes {
    ($v:expr) => {
        match $v {
            serde_cbor::Value::Bytes(b) => Ok(b),
            _ => Err($crate::error::WebauthnError::CBORDecodeError(
                "value",
                "expected bytes".to_string(),
            )),
        }
    };
}

macro_rules! cbor_try_string {
    ($v:expr) => {
        match $v {
            serde_cbor::Value::Text(s) => Ok(s.clone()),
            _ => Err($crate::error::WebauthnError::CBORDecodeError(
                "value",
                "expected text".to_string(),
            )),
        }
    };
}

macro_rules! cbor_try_i128 {
    ($v:expr) => {
        match $v {
            serde_cbor::Value::Integer(i) => Ok(*i),
            _ => Err($crate::error::WebauthnError::CBORDecodeError(
                "value",
                "expected integer".to_string(),
            )),
        }
    };
}
