// common_models/src/scalar.rs

//! 遥测数据中的标量值。
//!
//! `data` 和 `event` 消息的负载都是 `字符串 → 标量` 的映射。标量只允许
//! 字符串、整数、浮点数和布尔值四种类型；其他任何类型的值都必须先转换为它的
//! 字符串表示。这是一个有意为之、有文档说明的有损回退，而不是错误。

use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// 遥测负载映射。使用 `BTreeMap` 以保证编码结果中键的顺序是确定的。
pub type TelemetryMap = BTreeMap<String, ScalarValue>;

/// 遥测负载中的单个标量值。
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ScalarValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ScalarValue {
    /// 把任意可显示的值强制转换为字符串标量。
    ///
    /// 对应 "其他类型一律转为字符串表示" 的回退规则。
    pub fn coerce<T: fmt::Display + ?Sized>(value: &T) -> Self {
        Self::Text(value.to_string())
    }

    /// 若为字符串标量则返回其内容。
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

// 非有限浮点数 (NaN / ±inf) 无法表示为 JSON 数字，按回退规则编码为字符串。
impl Serialize for ScalarValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Boolean(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Self::Float(f) => serializer.serialize_str(&f.to_string()),
            Self::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for ScalarValue {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

macro_rules! scalar_from_lossless_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ScalarValue {
                fn from(value: $t) -> Self {
                    Self::Integer(i64::from(value))
                }
            }
        )*
    };
}

scalar_from_lossless_int!(i8, i16, i32, i64, u8, u16, u32);

// 超出 i64 范围的无符号整数走字符串回退，而不是静默截断。
impl From<u64> for ScalarValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(v) => Self::Integer(v),
            Err(_) => Self::Text(value.to_string()),
        }
    }
}

impl From<usize> for ScalarValue {
    fn from(value: usize) -> Self {
        Self::from(value as u64)
    }
}

impl From<f32> for ScalarValue {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// 从任意 JSON 值转换。
///
/// 数字、字符串、布尔值原样保留；`null`、数组和对象按回退规则转为其 JSON 文本。
impl From<serde_json::Value> for ScalarValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Bool(b) => Self::Boolean(b),
            Value::String(s) => Self::Text(s),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    Self::from(u)
                } else if let Some(f) = n.as_f64() {
                    Self::Float(f)
                } else {
                    Self::Text(n.to_string())
                }
            }
            other => Self::Text(other.to_string()),
        }
    }
}
