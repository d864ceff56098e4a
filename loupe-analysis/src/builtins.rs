//! Builtin signature provider: seeds the code base with declared types for a
//! slice of the standard library so call sites against native functions can
//! be checked without source bodies.

use crate::codebase::{CodeBase, FunctionLike};
use crate::comment::union_type_from_string;
use crate::context::Parameter;
use crate::fqsen::Fqsen;

pub struct BuiltinParam {
    pub name: &'static str,
    pub ty: &'static str,
    pub by_ref: bool,
    pub optional: bool,
    pub variadic: bool,
}

pub struct BuiltinSignature {
    pub name: &'static str,
    pub return_type: &'static str,
    pub params: &'static [BuiltinParam],
    /// First runtime version shipping this function, when newer than the
    /// oldest version the engine targets.
    pub min_version: Option<&'static str>,
}

const fn required(name: &'static str, ty: &'static str) -> BuiltinParam {
    BuiltinParam {
        name,
        ty,
        by_ref: false,
        optional: false,
        variadic: false,
    }
}

const fn optional(name: &'static str, ty: &'static str) -> BuiltinParam {
    BuiltinParam {
        name,
        ty,
        by_ref: false,
        optional: true,
        variadic: false,
    }
}

const fn by_ref(name: &'static str, ty: &'static str) -> BuiltinParam {
    BuiltinParam {
        name,
        ty,
        by_ref: true,
        optional: false,
        variadic: false,
    }
}

const fn by_ref_optional(name: &'static str, ty: &'static str) -> BuiltinParam {
    BuiltinParam {
        name,
        ty,
        by_ref: true,
        optional: true,
        variadic: false,
    }
}

const fn variadic(name: &'static str, ty: &'static str) -> BuiltinParam {
    BuiltinParam {
        name,
        ty,
        by_ref: false,
        optional: true,
        variadic: true,
    }
}

pub const BUILTIN_FUNCTIONS: &[BuiltinSignature] = &[
    BuiltinSignature {
        name: "strlen",
        return_type: "int",
        params: &[required("string", "string")],
        min_version: None,
    },
    BuiltinSignature {
        name: "count",
        return_type: "int",
        params: &[required("value", "array")],
        min_version: None,
    },
    BuiltinSignature {
        name: "implode",
        return_type: "string",
        params: &[required("separator", "string"), optional("array", "array")],
        min_version: None,
    },
    BuiltinSignature {
        name: "explode",
        return_type: "string[]",
        params: &[
            required("separator", "string"),
            required("string", "string"),
            optional("limit", "int"),
        ],
        min_version: None,
    },
    BuiltinSignature {
        name: "in_array",
        return_type: "bool",
        params: &[
            required("needle", "mixed"),
            required("haystack", "array"),
            optional("strict", "bool"),
        ],
        min_version: None,
    },
    BuiltinSignature {
        name: "array_keys",
        return_type: "array",
        params: &[required("array", "array")],
        min_version: None,
    },
    BuiltinSignature {
        name: "array_map",
        return_type: "array",
        params: &[required("callback", "callable"), required("array", "array")],
        min_version: None,
    },
    BuiltinSignature {
        name: "array_push",
        return_type: "int",
        params: &[by_ref("array", "array"), variadic("values", "mixed")],
        min_version: None,
    },
    BuiltinSignature {
        name: "sort",
        return_type: "bool",
        params: &[by_ref("array", "array"), optional("flags", "int")],
        min_version: None,
    },
    BuiltinSignature {
        name: "preg_match",
        return_type: "int|bool",
        params: &[
            required("pattern", "string"),
            required("subject", "string"),
            by_ref_optional("matches", "string[]"),
        ],
        min_version: None,
    },
    BuiltinSignature {
        name: "sprintf",
        return_type: "string",
        params: &[required("format", "string"), variadic("values", "mixed")],
        min_version: None,
    },
    BuiltinSignature {
        name: "is_string",
        return_type: "bool",
        params: &[required("value", "mixed")],
        min_version: None,
    },
    BuiltinSignature {
        name: "intdiv",
        return_type: "int",
        params: &[required("num1", "int"), required("num2", "int")],
        min_version: Some("7.0"),
    },
    BuiltinSignature {
        name: "str_contains",
        return_type: "bool",
        params: &[required("haystack", "string"), required("needle", "string")],
        min_version: Some("8.0"),
    },
    BuiltinSignature {
        name: "str_starts_with",
        return_type: "bool",
        params: &[required("haystack", "string"), required("needle", "string")],
        min_version: Some("8.0"),
    },
    BuiltinSignature {
        name: "array_is_list",
        return_type: "bool",
        params: &[required("array", "array")],
        min_version: Some("8.1"),
    },
];

/// Registers every builtin signature as an internal definition. Runs before
/// the declaration pass so user redefinitions become alternates of these.
pub fn seed(codebase: &mut CodeBase) {
    for builtin in BUILTIN_FUNCTIONS {
        let fqsen = Fqsen::from_full_name(builtin.name);
        let mut function = FunctionLike::new(fqsen, "<internal>", 0);
        function.is_internal = true;
        function.min_version = builtin.min_version;
        function.return_type = union_type_from_string(builtin.return_type, "");
        function.has_declared_return_type = true;
        function.parameters = builtin
            .params
            .iter()
            .map(|param| Parameter {
                name: param.name.to_string(),
                union_type: union_type_from_string(param.ty, ""),
                is_optional: param.optional,
                is_variadic: param.variadic,
                is_pass_by_reference: param.by_ref,
                default_type: Default::default(),
            })
            .collect();
        codebase.add_function(function);
    }
}
