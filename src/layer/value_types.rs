//! Value Type Vocabulary
//!
//! The closed set of attribute value types a schema may declare. Every
//! scalar type also exists in array form (`float3[]`), except `opaque` and
//! `group`.

/// A resolved attribute value type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueType {
    /// Name as written in the document (`float3[]`)
    pub name: String,
    /// Symbolic name used by generated code (`Float3Array`)
    pub symbol: String,
    /// Target language type (`VtArray<GfVec3f>`)
    pub cpp_type_name: String,
    pub is_array: bool,
}

impl ValueType {
    pub fn is_token(&self) -> bool {
        self.name == "token"
    }
}

// (name, symbol, cpp type, has array form)
const SCALAR_TYPES: &[(&str, &str, &str, bool)] = &[
    ("bool", "Bool", "bool", true),
    ("uchar", "UChar", "unsigned char", true),
    ("int", "Int", "int", true),
    ("uint", "UInt", "unsigned int", true),
    ("int64", "Int64", "int64_t", true),
    ("uint64", "UInt64", "uint64_t", true),
    ("half", "Half", "GfHalf", true),
    ("float", "Float", "float", true),
    ("double", "Double", "double", true),
    ("timecode", "TimeCode", "SdfTimeCode", true),
    ("string", "String", "std::string", true),
    ("token", "Token", "TfToken", true),
    ("asset", "Asset", "SdfAssetPath", true),
    ("matrix2d", "Matrix2d", "GfMatrix2d", true),
    ("matrix3d", "Matrix3d", "GfMatrix3d", true),
    ("matrix4d", "Matrix4d", "GfMatrix4d", true),
    ("quatd", "Quatd", "GfQuatd", true),
    ("quatf", "Quatf", "GfQuatf", true),
    ("quath", "Quath", "GfQuath", true),
    ("double2", "Double2", "GfVec2d", true),
    ("float2", "Float2", "GfVec2f", true),
    ("half2", "Half2", "GfVec2h", true),
    ("int2", "Int2", "GfVec2i", true),
    ("double3", "Double3", "GfVec3d", true),
    ("float3", "Float3", "GfVec3f", true),
    ("half3", "Half3", "GfVec3h", true),
    ("int3", "Int3", "GfVec3i", true),
    ("double4", "Double4", "GfVec4d", true),
    ("float4", "Float4", "GfVec4f", true),
    ("half4", "Half4", "GfVec4h", true),
    ("int4", "Int4", "GfVec4i", true),
    ("point3d", "Point3d", "GfVec3d", true),
    ("point3f", "Point3f", "GfVec3f", true),
    ("point3h", "Point3h", "GfVec3h", true),
    ("normal3d", "Normal3d", "GfVec3d", true),
    ("normal3f", "Normal3f", "GfVec3f", true),
    ("normal3h", "Normal3h", "GfVec3h", true),
    ("vector3d", "Vector3d", "GfVec3d", true),
    ("vector3f", "Vector3f", "GfVec3f", true),
    ("vector3h", "Vector3h", "GfVec3h", true),
    ("color3d", "Color3d", "GfVec3d", true),
    ("color3f", "Color3f", "GfVec3f", true),
    ("color3h", "Color3h", "GfVec3h", true),
    ("color4d", "Color4d", "GfVec4d", true),
    ("color4f", "Color4f", "GfVec4f", true),
    ("color4h", "Color4h", "GfVec4h", true),
    ("frame4d", "Frame4d", "GfMatrix4d", true),
    ("texCoord2d", "TexCoord2d", "GfVec2d", true),
    ("texCoord2f", "TexCoord2f", "GfVec2f", true),
    ("texCoord2h", "TexCoord2h", "GfVec2h", true),
    ("texCoord3d", "TexCoord3d", "GfVec3d", true),
    ("texCoord3f", "TexCoord3f", "GfVec3f", true),
    ("texCoord3h", "TexCoord3h", "GfVec3h", true),
    ("opaque", "Opaque", "SdfOpaqueValue", false),
    ("group", "Group", "SdfOpaqueValue", false),
];

/// Look up a declared type name, returning `None` outside the vocabulary.
pub fn find_value_type(type_name: &str) -> Option<ValueType> {
    let (base, is_array) = match type_name.strip_suffix("[]") {
        Some(base) => (base, true),
        None => (type_name, false),
    };
    let &(name, symbol, cpp, has_array) = SCALAR_TYPES.iter().find(|(n, ..)| *n == base)?;
    if is_array && !has_array {
        return None;
    }
    Some(if is_array {
        ValueType {
            name: format!("{name}[]"),
            symbol: format!("{symbol}Array"),
            cpp_type_name: format!("VtArray<{cpp}>"),
            is_array: true,
        }
    } else {
        ValueType {
            name: name.to_string(),
            symbol: symbol.to_string(),
            cpp_type_name: cpp.to_string(),
            is_array: false,
        }
    })
}

pub fn is_known_value_type(type_name: &str) -> bool {
    find_value_type(type_name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_lookup() {
        let t = find_value_type("float3").unwrap();
        assert_eq!(t.symbol, "Float3");
        assert_eq!(t.cpp_type_name, "GfVec3f");
        assert!(!t.is_array);
    }

    #[test]
    fn test_array_lookup() {
        let t = find_value_type("token[]").unwrap();
        assert_eq!(t.symbol, "TokenArray");
        assert_eq!(t.cpp_type_name, "VtArray<TfToken>");
        assert!(!t.is_token());
    }

    #[test]
    fn test_unknown_types() {
        assert!(find_value_type("float5").is_none());
        assert!(find_value_type("opaque[]").is_none());
        assert!(is_known_value_type("group"));
    }
}
