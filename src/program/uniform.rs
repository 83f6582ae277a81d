/// A value settable on a uniform slot.
///
/// Matrices are column-major flat arrays, matching the device convention.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum UniformValue {
    Float(f32),
    FloatVector2([f32; 2]),
    FloatVector3([f32; 3]),
    FloatVector4([f32; 4]),
    Integer(i32),
    IntegerVector2([i32; 2]),
    IntegerVector3([i32; 3]),
    IntegerVector4([i32; 4]),
    UnsignedInteger(u32),
    UnsignedIntegerVector2([u32; 2]),
    UnsignedIntegerVector3([u32; 3]),
    UnsignedIntegerVector4([u32; 4]),
    Boolean(bool),
    FloatMatrix2x2([f32; 4]),
    FloatMatrix3x3([f32; 9]),
    FloatMatrix4x4([f32; 16]),
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(value: [f32; 2]) -> Self {
        UniformValue::FloatVector2(value)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(value: [f32; 3]) -> Self {
        UniformValue::FloatVector3(value)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(value: [f32; 4]) -> Self {
        UniformValue::FloatVector4(value)
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        UniformValue::Integer(value)
    }
}

impl From<[i32; 2]> for UniformValue {
    fn from(value: [i32; 2]) -> Self {
        UniformValue::IntegerVector2(value)
    }
}

impl From<[i32; 3]> for UniformValue {
    fn from(value: [i32; 3]) -> Self {
        UniformValue::IntegerVector3(value)
    }
}

impl From<[i32; 4]> for UniformValue {
    fn from(value: [i32; 4]) -> Self {
        UniformValue::IntegerVector4(value)
    }
}

impl From<u32> for UniformValue {
    fn from(value: u32) -> Self {
        UniformValue::UnsignedInteger(value)
    }
}

impl From<[u32; 2]> for UniformValue {
    fn from(value: [u32; 2]) -> Self {
        UniformValue::UnsignedIntegerVector2(value)
    }
}

impl From<[u32; 3]> for UniformValue {
    fn from(value: [u32; 3]) -> Self {
        UniformValue::UnsignedIntegerVector3(value)
    }
}

impl From<[u32; 4]> for UniformValue {
    fn from(value: [u32; 4]) -> Self {
        UniformValue::UnsignedIntegerVector4(value)
    }
}

impl From<bool> for UniformValue {
    fn from(value: bool) -> Self {
        UniformValue::Boolean(value)
    }
}

impl From<[f32; 9]> for UniformValue {
    fn from(value: [f32; 9]) -> Self {
        UniformValue::FloatMatrix3x3(value)
    }
}

impl From<[f32; 16]> for UniformValue {
    fn from(value: [f32; 16]) -> Self {
        UniformValue::FloatMatrix4x4(value)
    }
}
