//! Typed input values and their MaterialX string form.

use std::fmt;

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

use crate::util::{Error, Result};

/// Input value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Boolean value.
    Boolean(bool),
    /// Integer value.
    Integer(i32),
    /// Float value.
    Float(f32),
    /// Color3 value (RGB).
    Color3(Vec3),
    /// Color4 value (RGBA).
    Color4(Vec4),
    /// Vector2 value.
    Vector2(Vec2),
    /// Vector3 value.
    Vector3(Vec3),
    /// Vector4 value.
    Vector4(Vec4),
    /// Row-major 3x3 matrix in string form, stored as glam column-major.
    Matrix33(Mat3),
    /// Row-major 4x4 matrix in string form, stored as glam column-major.
    Matrix44(Mat4),
    /// String value.
    String(String),
    /// File reference.
    Filename(String),
    /// Value of a type without a dedicated variant, kept verbatim.
    Other { type_name: String, value: String },
}

pub const BOOLEAN_TYPE: &str = "boolean";
pub const INTEGER_TYPE: &str = "integer";
pub const FLOAT_TYPE: &str = "float";
pub const COLOR3_TYPE: &str = "color3";
pub const COLOR4_TYPE: &str = "color4";
pub const VECTOR2_TYPE: &str = "vector2";
pub const VECTOR3_TYPE: &str = "vector3";
pub const VECTOR4_TYPE: &str = "vector4";
pub const MATRIX33_TYPE: &str = "matrix33";
pub const MATRIX44_TYPE: &str = "matrix44";
pub const STRING_TYPE: &str = "string";
pub const FILENAME_TYPE: &str = "filename";
pub const SURFACESHADER_TYPE: &str = "surfaceshader";
pub const MATERIAL_TYPE: &str = "material";
pub const MULTIOUTPUT_TYPE: &str = "multioutput";

/// Types whose value strings are comma-separated numbers.
pub fn is_numeric_type(type_name: &str) -> bool {
    matches!(
        type_name,
        INTEGER_TYPE
            | FLOAT_TYPE
            | COLOR3_TYPE
            | COLOR4_TYPE
            | VECTOR2_TYPE
            | VECTOR3_TYPE
            | VECTOR4_TYPE
            | MATRIX33_TYPE
            | MATRIX44_TYPE
    )
}

impl Value {
    /// MaterialX type name of this value.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Boolean(_) => BOOLEAN_TYPE,
            Value::Integer(_) => INTEGER_TYPE,
            Value::Float(_) => FLOAT_TYPE,
            Value::Color3(_) => COLOR3_TYPE,
            Value::Color4(_) => COLOR4_TYPE,
            Value::Vector2(_) => VECTOR2_TYPE,
            Value::Vector3(_) => VECTOR3_TYPE,
            Value::Vector4(_) => VECTOR4_TYPE,
            Value::Matrix33(_) => MATRIX33_TYPE,
            Value::Matrix44(_) => MATRIX44_TYPE,
            Value::String(_) => STRING_TYPE,
            Value::Filename(_) => FILENAME_TYPE,
            Value::Other { type_name, .. } => type_name,
        }
    }

    /// Parse a value string of the given type.
    pub fn parse(type_name: &str, text: &str) -> Result<Value> {
        let invalid = || Error::InvalidValue {
            type_name: type_name.to_string(),
            value: text.to_string(),
        };
        let floats = |count: usize| -> Result<Vec<f32>> {
            let parts = text
                .split(',')
                .map(|p| p.trim().parse::<f32>().map_err(|_| invalid()))
                .collect::<Result<Vec<f32>>>()?;
            if parts.len() == count {
                Ok(parts)
            } else {
                Err(invalid())
            }
        };

        let value = match type_name {
            BOOLEAN_TYPE => match text.trim() {
                "true" => Value::Boolean(true),
                "false" => Value::Boolean(false),
                _ => return Err(invalid()),
            },
            INTEGER_TYPE => Value::Integer(text.trim().parse().map_err(|_| invalid())?),
            FLOAT_TYPE => Value::Float(text.trim().parse().map_err(|_| invalid())?),
            COLOR3_TYPE => Value::Color3(Vec3::from_slice(&floats(3)?)),
            COLOR4_TYPE => Value::Color4(Vec4::from_slice(&floats(4)?)),
            VECTOR2_TYPE => Value::Vector2(Vec2::from_slice(&floats(2)?)),
            VECTOR3_TYPE => Value::Vector3(Vec3::from_slice(&floats(3)?)),
            VECTOR4_TYPE => Value::Vector4(Vec4::from_slice(&floats(4)?)),
            MATRIX33_TYPE => Value::Matrix33(Mat3::from_cols_slice(&floats(9)?).transpose()),
            MATRIX44_TYPE => Value::Matrix44(Mat4::from_cols_slice(&floats(16)?).transpose()),
            STRING_TYPE => Value::String(text.to_string()),
            FILENAME_TYPE => Value::Filename(text.to_string()),
            _ => Value::Other {
                type_name: type_name.to_string(),
                value: text.to_string(),
            },
        };
        Ok(value)
    }

    /// Format as a MaterialX value string.
    pub fn to_value_string(&self) -> String {
        fn join(values: &[f32]) -> String {
            values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
        }
        match self {
            Value::Boolean(v) => v.to_string(),
            Value::Integer(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Color3(v) | Value::Vector3(v) => join(&v.to_array()),
            Value::Color4(v) | Value::Vector4(v) => join(&v.to_array()),
            Value::Vector2(v) => join(&v.to_array()),
            Value::Matrix33(m) => join(&m.transpose().to_cols_array()),
            Value::Matrix44(m) => join(&m.transpose().to_cols_array()),
            Value::String(s) | Value::Filename(s) => s.clone(),
            Value::Other { value, .. } => value.clone(),
        }
    }

    /// Get as float if possible.
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(v) => Some(*v as f32),
            _ => None,
        }
    }

    /// Get as integer if possible.
    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as vec2 if possible.
    pub fn as_vec2(&self) -> Option<Vec2> {
        match self {
            Value::Vector2(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as vec3 if possible.
    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Value::Color3(v) | Value::Vector3(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as vec4 if possible.
    pub fn as_vec4(&self) -> Option<Vec4> {
        match self {
            Value::Color4(v) | Value::Vector4(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as string if possible.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Filename(s) => Some(s),
            _ => None,
        }
    }

    /// Component-wise comparison within `epsilon`; non-numeric values compare exactly.
    pub fn approx_eq(&self, other: &Value, epsilon: f32) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => (a - b).abs() <= epsilon,
            (Value::Color3(a), Value::Color3(b)) | (Value::Vector3(a), Value::Vector3(b)) => {
                a.abs_diff_eq(*b, epsilon)
            }
            (Value::Color4(a), Value::Color4(b)) | (Value::Vector4(a), Value::Vector4(b)) => {
                a.abs_diff_eq(*b, epsilon)
            }
            (Value::Vector2(a), Value::Vector2(b)) => a.abs_diff_eq(*b, epsilon),
            (Value::Matrix33(a), Value::Matrix33(b)) => a.abs_diff_eq(*b, epsilon),
            (Value::Matrix44(a), Value::Matrix44(b)) => a.abs_diff_eq(*b, epsilon),
            _ => self == other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_value_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vectors() {
        let v = Value::parse(COLOR3_TYPE, "0.8, 0.2,0.1").unwrap();
        assert_eq!(v, Value::Color3(Vec3::new(0.8, 0.2, 0.1)));
        assert_eq!(v.to_value_string(), "0.8, 0.2, 0.1");

        let v = Value::parse(VECTOR2_TYPE, "1, 2").unwrap();
        assert_eq!(v.as_vec2(), Some(Vec2::new(1.0, 2.0)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Value::parse(COLOR3_TYPE, "1, 2"),
            Err(Error::InvalidValue { .. })
        ));
        assert!(Value::parse(FLOAT_TYPE, "abc").is_err());
        assert!(Value::parse(BOOLEAN_TYPE, "yes").is_err());
    }

    #[test]
    fn test_matrix_row_major() {
        let text = "1, 2, 3, 4, 5, 6, 7, 8, 9";
        let v = Value::parse(MATRIX33_TYPE, text).unwrap();
        if let Value::Matrix33(m) = &v {
            // First row is 1, 2, 3
            assert_eq!(m.row(0), Vec3::new(1.0, 2.0, 3.0));
        } else {
            panic!("expected matrix33");
        }
        assert_eq!(v.to_value_string(), text);
    }

    #[test]
    fn test_unknown_type_kept() {
        let v = Value::parse("BSDF", "").unwrap();
        assert_eq!(v.type_name(), "BSDF");
        assert!(!is_numeric_type("BSDF"));
        assert!(is_numeric_type(VECTOR3_TYPE));
    }

    #[test]
    fn test_approx_eq() {
        let a = Value::Float(0.3);
        assert!(a.approx_eq(&Value::Float(0.3000001), 1e-5));
        assert!(!a.approx_eq(&Value::Integer(0), 1e-5));
    }
}
