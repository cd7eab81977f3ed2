//! Source text assembly shared by the generators

use std::collections::BTreeSet;
use std::sync::Arc;

use loom_engine::parser::escape;
use loom_sdk::{TypeDescriptor, TypeKind};
use regex::Regex;

use crate::conversion::{Declared, RoutedMembers};
use crate::error::RuntimeError;

/// Marker replaced by the embedded `_source` field.
pub const SOURCE_PLACEHOLDER: &str = "/*sourceplaceholder*/";

/// Line-oriented writer with brace-depth indentation.
#[derive(Debug, Default)]
pub struct SourceWriter {
    out: String,
    depth: usize,
}

impl SourceWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.out.push_str("    ");
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.out.push('\n');
        self
    }

    /// Emit a caller-supplied fragment line by line at the current depth.
    pub fn fragment(&mut self, code: &str) -> &mut Self {
        for line in code.lines() {
            self.line(line.trim());
        }
        self
    }

    pub fn open(&mut self, header: impl AsRef<str>) -> &mut Self {
        self.line(header);
        self.line("{");
        self.depth += 1;
        self
    }

    pub fn close(&mut self) -> &mut Self {
        self.depth = self.depth.saturating_sub(1);
        self.line("}")
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// Render a type the way source refers to it.
///
/// The arity marker is dropped and arguments are rendered recursively as
/// `<A,B>`. A generic parameter named `T` stands for the generated type.
pub fn friendly_name(ty: &TypeDescriptor, generated_type: &str) -> String {
    match ty.kind() {
        TypeKind::Void => return "void".to_string(),
        TypeKind::GenericParameter if ty.name().eq_ignore_ascii_case("T") => return generated_type.to_string(),
        TypeKind::GenericParameter => return ty.name().to_string(),
        _ => {}
    }

    let full = ty.full_name();
    let mut name = match full.find('`') {
        Some(i) => full[..i].to_string(),
        None => full,
    };
    if !ty.generic_args().is_empty() {
        let args: Vec<String> = ty
            .generic_args()
            .iter()
            .map(|arg| friendly_name(arg, generated_type))
            .collect();
        name.push('<');
        name.push_str(&args.join(","));
        name.push('>');
    }
    name
}

/// Namespaces to import for `types`, sorted and unique.
pub fn import_namespaces<'a>(
    types: impl IntoIterator<Item = &'a Arc<TypeDescriptor>>,
    extra: &[String],
) -> BTreeSet<String> {
    let mut namespaces = BTreeSet::new();
    namespaces.insert(loom_sdk::CORE_UNIT.to_string());
    for ty in types {
        collect_namespaces(ty, &mut namespaces);
    }
    namespaces.extend(extra.iter().filter(|n| !n.is_empty()).cloned());
    namespaces
}

fn collect_namespaces(ty: &TypeDescriptor, out: &mut BTreeSet<String>) {
    if ty.kind() != TypeKind::GenericParameter && !ty.namespace().is_empty() {
        out.insert(ty.namespace().to_string());
    }
    for arg in ty.generic_args() {
        collect_namespaces(arg, out);
    }
}

/// Every type reachable through generic arguments, `ty` included.
pub fn expand_generic(ty: &Arc<TypeDescriptor>, out: &mut Vec<Arc<TypeDescriptor>>) {
    if out.iter().any(|t| t.key() == ty.key()) {
        return;
    }
    out.push(ty.clone());
    for arg in ty.generic_args() {
        expand_generic(arg, out);
    }
}

/// Anchored regex for a glob: `?` is one character, `*` any sequence.
pub fn glob_regex(pattern: &str) -> Result<Regex, RuntimeError> {
    let escaped = regex::escape(pattern).replace(r"\?", ".").replace(r"\*", ".*");
    Regex::new(&format!("^{}$", escaped))
        .map_err(|e| RuntimeError::Generation(format!("Invalid member pattern '{}': {}", pattern, e)))
}

/// `__<base>`, numbered from 2 while a name in `taken` already uses it.
///
/// Generated locals and fields take these names so host parameter names
/// cannot shadow or redeclare them.
pub fn reserved_name(base: &str, taken: &[String]) -> String {
    let mut name = format!("__{}", base);
    let mut n = 1;
    while taken.iter().any(|t| *t == name) {
        n += 1;
        name = format!("__{}{}", base, n);
    }
    name
}

/// Backing fields, then the constructor header and field assignments.
/// Leaves the constructor block open.
pub fn write_constructor_header(code: &mut SourceWriter, type_name: &str, members: &RoutedMembers) {
    let constructor = members.constructor();
    for declared in constructor {
        code.line(format!("private {} {};", declared.ty, declared.field()));
    }
    if !constructor.is_empty() {
        code.blank();
    }
    let params: Vec<String> = constructor.iter().map(|d| format!("{} {}", d.ty, d.name)).collect();
    code.open(format!("public {}({})", type_name, params.join(", ")));
    for declared in constructor {
        code.line(format!("{} = {};", declared.field(), declared.name));
    }
}

/// Auto properties for routed public-property parameters.
pub fn write_routed_properties(code: &mut SourceWriter, members: &RoutedMembers) {
    if members.properties().is_empty() {
        return;
    }
    code.blank();
    for Declared { ty, name } in members.properties() {
        code.line(format!("public {} {} {{ get; set; }}", ty, name));
    }
}

/// Replace the placeholder with a `_source` field holding the final text.
pub fn embed_source(code: &str) -> String {
    let without = code.replace(SOURCE_PLACEHOLDER, "");
    code.replace(
        SOURCE_PLACEHOLDER,
        &format!("private string _source = \"{}\";", escape(&without)),
    )
}
