//! Per-type field and method tables
//!
//! A [`TypeDescriptor`] flattens everything a script can reach on a type into
//! lookup tables: exposed fields (promoted through embedded structs) with their
//! index paths, value-receiver methods and pointer-receiver methods. Descriptors
//! are built on first use and cached per `(type, options)` for the lifetime of
//! the thread.

use crate::config::ReflectOptions;
use crate::reflect::{Exposure, Kind, Method, Receiver, Type};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use tracing::{debug, warn};

thread_local! {
    static CACHE: RefCell<HashMap<(Type, ReflectOptions), Rc<TypeDescriptor>>> =
        RefCell::new(HashMap::new());
}

/// An exposed struct field
#[derive(Debug, Clone)]
pub struct FieldEntry {
    name: String,
    declared: String,
    path: Vec<usize>,
    ty: Type,
}

impl FieldEntry {
    /// Name scripts use for the field
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name the field was declared with
    pub fn declared_name(&self) -> &str {
        &self.declared
    }

    /// Field indices from the outer struct down to this field
    pub fn path(&self) -> &[usize] {
        &self.path
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }
}

/// A method reachable on the described type, possibly promoted
#[derive(Debug, Clone)]
pub struct MethodEntry {
    method: Rc<Method>,
    path: Vec<usize>,
    owner: Type,
}

impl MethodEntry {
    pub fn name(&self) -> &str {
        self.method.name()
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path to the embedded field that declares the method; empty when declared
    /// on the described type itself
    pub fn path(&self) -> &[usize] {
        &self.path
    }

    /// Type the method is declared on
    pub fn owner(&self) -> &Type {
        &self.owner
    }

    pub fn receiver(&self) -> Receiver {
        self.method.receiver()
    }
}

/// Name table with exact lookup and a case-insensitive fallback
#[derive(Debug)]
struct Table<T> {
    entries: Vec<T>,
    exact: HashMap<String, usize>,
    folded: HashMap<String, usize>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            exact: HashMap::new(),
            folded: HashMap::new(),
        }
    }
}

impl<T> Table<T> {
    fn insert(&mut self, name: &str, entry: T) {
        let index = self.entries.len();
        self.entries.push(entry);
        self.exact.insert(name.to_string(), index);
        self.folded.entry(name.to_lowercase()).or_insert(index);
    }

    /// Entry without a case-insensitive alias
    fn insert_exact(&mut self, name: &str, entry: T) {
        self.entries.push(entry);
        self.exact.insert(name.to_string(), self.entries.len() - 1);
    }

    fn get(&self, name: &str) -> Option<&T> {
        self.get_exact(name).or_else(|| self.get_folded(name))
    }

    fn get_exact(&self, name: &str) -> Option<&T> {
        self.entries.get(*self.exact.get(name)?)
    }

    fn get_folded(&self, name: &str) -> Option<&T> {
        self.entries.get(*self.folded.get(&name.to_lowercase())?)
    }

    fn contains_exact(&self, name: &str) -> bool {
        self.exact.contains_key(name)
    }

    fn contains_folded(&self, name: &str) -> bool {
        self.folded.contains_key(&name.to_lowercase())
    }
}

/// What a name on a struct proxy resolves to
#[derive(Debug, Clone, Copy)]
pub enum Member<'a> {
    Field(&'a FieldEntry),
    Method(&'a MethodEntry),
    PtrMethod(&'a MethodEntry),
}

/// Fields and methods of a type as scripts see them
#[derive(Debug)]
pub struct TypeDescriptor {
    ty: Type,
    options: ReflectOptions,
    fields: Table<FieldEntry>,
    methods: Table<MethodEntry>,
    ptr_methods: Table<MethodEntry>,
}

impl TypeDescriptor {
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn options(&self) -> ReflectOptions {
        self.options
    }

    /// Field exposed as `name`, falling back to a case-insensitive match
    pub fn field(&self, name: &str) -> Option<&FieldEntry> {
        self.fields.get(name)
    }

    /// Value-receiver method named `name`
    pub fn method(&self, name: &str) -> Option<&MethodEntry> {
        self.methods.get(name)
    }

    /// Pointer-receiver method named `name`
    pub fn ptr_method(&self, name: &str) -> Option<&MethodEntry> {
        self.ptr_methods.get(name)
    }

    /// Resolve `name` against methods and fields together. Exact-case matches of
    /// either kind win over case-insensitive ones, so `ID` finds a field `ID`
    /// even when a method `Id` exists.
    pub fn member(&self, name: &str) -> Option<Member<'_>> {
        let exact = self
            .methods
            .get_exact(name)
            .map(Member::Method)
            .or_else(|| self.ptr_methods.get_exact(name).map(Member::PtrMethod))
            .or_else(|| self.fields.get_exact(name).map(Member::Field));
        exact.or_else(|| {
            self.methods
                .get_folded(name)
                .map(Member::Method)
                .or_else(|| self.ptr_methods.get_folded(name).map(Member::PtrMethod))
                .or_else(|| self.fields.get_folded(name).map(Member::Field))
        })
    }

    /// Exposed fields in declaration order, shallowest first
    pub fn fields(&self) -> impl Iterator<Item = &FieldEntry> {
        self.fields.entries.iter()
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodEntry> {
        self.methods.entries.iter()
    }

    pub fn ptr_methods(&self) -> impl Iterator<Item = &MethodEntry> {
        self.ptr_methods.entries.iter()
    }
}

/// Descriptor for `ty` (for pointer types, the pointed-to type), built on first
/// request and cached afterwards.
pub fn describe(ty: &Type, options: ReflectOptions) -> Rc<TypeDescriptor> {
    let base = match (ty.kind(), ty.elem()) {
        (Kind::Ptr, Some(elem)) => elem.clone(),
        _ => ty.clone(),
    };
    let key = (base, options);

    if let Some(cached) = CACHE.with(|cache| cache.borrow().get(&key).cloned()) {
        return cached;
    }

    let descriptor = Rc::new(build(&key.0, options));
    debug!(
        "Built descriptor for {}: {} fields, {} methods, {} pointer methods",
        key.0,
        descriptor.fields.entries.len(),
        descriptor.methods.entries.len(),
        descriptor.ptr_methods.entries.len()
    );
    CACHE.with(|cache| {
        cache
            .borrow_mut()
            .entry(key)
            .or_insert_with(|| Rc::clone(&descriptor))
            .clone()
    })
}

struct FieldCandidate {
    name: String,
    renamed: bool,
    entry: FieldEntry,
}

struct Level {
    ty: Type,
    path: Vec<usize>,
}

fn build(ty: &Type, options: ReflectOptions) -> TypeDescriptor {
    let mut fields = Table::default();
    let mut methods = Table::default();
    let mut ptr_methods = Table::default();

    // Names settled at a shallower depth (including ambiguous ones) block deeper ones
    let mut claimed_fields = HashSet::new();
    let mut claimed_methods = HashSet::new();
    let mut seen_types = HashSet::new();

    let mut level = vec![Level {
        ty: ty.clone(),
        path: Vec::new(),
    }];

    while !level.is_empty() {
        let mut field_candidates = Vec::new();
        let mut method_candidates: Vec<MethodEntry> = Vec::new();
        let mut next = Vec::new();

        for Level { ty: current, path } in &level {
            for method in current.declared_methods().iter() {
                if method.is_exported() {
                    method_candidates.push(MethodEntry {
                        method: Rc::clone(method),
                        path: path.clone(),
                        owner: current.clone(),
                    });
                }
            }

            for (index, field) in current.fields().iter().enumerate() {
                let mut field_path = path.clone();
                field_path.push(index);

                if field.is_embedded()
                    && field.ty().kind() == Kind::Struct
                    && seen_types.insert(field.ty().clone())
                {
                    next.push(Level {
                        ty: field.ty().clone(),
                        path: field_path.clone(),
                    });
                }

                if !field.is_exported() {
                    continue;
                }
                let (name, renamed) = match field.exposure() {
                    Exposure::Hidden => continue,
                    Exposure::Rename(name) => (name.clone(), true),
                    Exposure::Default => (field.name().to_string(), false),
                };
                field_candidates.push(FieldCandidate {
                    name,
                    renamed,
                    entry: FieldEntry {
                        name: String::new(),
                        declared: field.name().to_string(),
                        path: field_path,
                        ty: field.ty().clone(),
                    },
                });
            }
        }

        settle_fields(ty, field_candidates, &mut claimed_fields, &mut fields);
        settle_methods(
            method_candidates,
            &mut claimed_methods,
            &mut methods,
            &mut ptr_methods,
        );
        level = next;
    }

    // Fields shadow methods of the same name
    methods = without_shadowed(methods, &fields);
    ptr_methods = without_shadowed(ptr_methods, &fields);

    TypeDescriptor {
        ty: ty.clone(),
        options,
        fields,
        methods,
        ptr_methods,
    }
}

fn settle_fields(
    ty: &Type,
    candidates: Vec<FieldCandidate>,
    claimed: &mut HashSet<String>,
    fields: &mut Table<FieldEntry>,
) {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<FieldCandidate>> = HashMap::new();
    for candidate in candidates {
        if claimed.contains(&candidate.name) {
            continue;
        }
        if !groups.contains_key(&candidate.name) {
            order.push(candidate.name.clone());
        }
        groups
            .entry(candidate.name.clone())
            .or_default()
            .push(candidate);
    }

    for name in order {
        let Some(mut group) = groups.remove(&name) else {
            continue;
        };
        claimed.insert(name.clone());

        let winner = if group.len() == 1 {
            group.pop()
        } else {
            let renamed: Vec<usize> = group
                .iter()
                .enumerate()
                .filter(|(_, c)| c.renamed)
                .map(|(i, _)| i)
                .collect();
            match renamed.as_slice() {
                [single] => Some(group.swap_remove(*single)),
                _ => None,
            }
        };

        match winner {
            Some(FieldCandidate { name, mut entry, .. }) => {
                entry.name = name.clone();
                fields.insert(&name, entry);
            }
            None => warn!("Ambiguous field {} on {} is not exposed", name, ty),
        }
    }
}

fn settle_methods(
    candidates: Vec<MethodEntry>,
    claimed: &mut HashSet<String>,
    methods: &mut Table<MethodEntry>,
    ptr_methods: &mut Table<MethodEntry>,
) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for candidate in &candidates {
        *counts.entry(candidate.name().to_string()).or_default() += 1;
    }

    for candidate in candidates {
        let name = candidate.name().to_string();
        if claimed.contains(&name) {
            continue;
        }
        if counts.get(&name).copied().unwrap_or(0) > 1 {
            // Ambiguous at this depth; deeper declarations stay hidden too
            warn!("Ambiguous method {} on {} is not exposed", name, candidate.owner);
            claimed.insert(name);
            continue;
        }
        claimed.insert(name.clone());
        match candidate.receiver() {
            Receiver::Value => methods.insert(&name, candidate),
            Receiver::Pointer => ptr_methods.insert(&name, candidate),
        }
    }
}

fn without_shadowed(table: Table<MethodEntry>, fields: &Table<FieldEntry>) -> Table<MethodEntry> {
    let mut kept = Table::default();
    for entry in table.entries {
        let name = entry.name().to_string();
        if fields.contains_exact(&name) {
            continue;
        }
        // A field folding to the same name keeps the case-insensitive spelling
        if fields.contains_folded(&name) {
            kept.insert_exact(&name, entry);
        } else {
            kept.insert(&name, entry);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{Field, Signature, Value};
    use tracing_test::traced_test;

    fn hello() -> Method {
        Method::new(
            "Hello",
            Receiver::Value,
            Signature::new(vec![], vec![Type::string()]),
            |_, _, _| Ok(vec![Value::from("hi")]),
        )
    }

    #[test]
    fn test_rename_and_hide() {
        let ty = Type::named(
            "Hidden",
            Type::structure(vec![
                Field::new("Name", Type::string()).rename("name"),
                Field::new("Name2", Type::string()).rename("Name"),
                Field::new("Str", Type::string()),
                Field::new("Hidden", Type::bool()).hidden(),
            ]),
        );
        let desc = describe(&ty, ReflectOptions::default());

        assert_eq!(desc.field("name").unwrap().declared_name(), "Name");
        assert_eq!(desc.field("Name").unwrap().declared_name(), "Name2");
        assert_eq!(desc.field("str").unwrap().declared_name(), "Str");
        assert!(desc.field("Hidden").is_none());
        assert!(desc.field("hidden").is_none());
    }

    #[test]
    fn test_rename_beats_default_name() {
        let ty = Type::structure(vec![
            Field::new("Title", Type::string()),
            Field::new("Heading", Type::string()).rename("Title"),
        ]);
        let desc = describe(&ty, ReflectOptions::default());
        assert_eq!(desc.field("Title").unwrap().declared_name(), "Heading");
        assert_eq!(desc.fields().count(), 1);
    }

    #[test]
    fn test_embedded_fields_are_promoted() {
        let inner = Type::named(
            "Inner",
            Type::structure(vec![
                Field::new("A", Type::int()),
                Field::new("B", Type::int()),
            ]),
        );
        inner.add_method(hello());
        let outer = Type::named(
            "Outer",
            Type::structure(vec![Field::embedded(inner.clone()), Field::new("B", Type::string())]),
        );
        let desc = describe(&outer, ReflectOptions::default());

        assert_eq!(desc.field("A").unwrap().path(), &[0, 0]);
        // Shallower field wins
        assert_eq!(desc.field("B").unwrap().path(), &[1]);
        assert_eq!(desc.field("Inner").unwrap().ty(), &inner);

        let method = desc.method("hello").unwrap();
        assert_eq!(method.path(), &[0]);
        assert_eq!(method.owner(), &inner);
    }

    #[test]
    #[traced_test]
    fn test_ambiguous_promoted_field_is_dropped() {
        let left = Type::named("Left", Type::structure(vec![Field::new("X", Type::int())]));
        let right = Type::named("Right", Type::structure(vec![Field::new("X", Type::int())]));
        let both = Type::named(
            "Both",
            Type::structure(vec![Field::embedded(left), Field::embedded(right)]),
        );
        let desc = describe(&both, ReflectOptions::default());

        assert!(desc.field("X").is_none());
        assert!(logs_contain("Ambiguous field X"));
        assert!(logs_contain("Built descriptor for Both"));
    }

    #[test]
    fn test_fields_shadow_methods() {
        let ty = Type::named(
            "Shadow",
            Type::structure(vec![Field::new("Hello", Type::string())]),
        );
        ty.add_method(hello());
        let desc = describe(&ty, ReflectOptions::default());
        assert!(desc.field("Hello").is_some());
        assert!(desc.method("Hello").is_none());
    }

    #[test]
    fn test_exact_case_beats_folded_method() {
        let ty = Type::named("Rec", Type::structure(vec![Field::new("ID", Type::int())]));
        ty.add_method(Method::new(
            "Id",
            Receiver::Value,
            Signature::new(vec![], vec![Type::int()]),
            |_, _, _| Ok(vec![Value::from(1)]),
        ));
        let desc = describe(&ty, ReflectOptions::default());

        assert!(matches!(desc.member("ID"), Some(Member::Field(_))));
        assert!(matches!(desc.member("id"), Some(Member::Field(_))));
        assert!(matches!(desc.member("Id"), Some(Member::Method(_))));
    }

    #[test]
    fn test_descriptor_is_cached_per_options() {
        let ty = Type::named("Cached", Type::structure(vec![]));
        let a = describe(&ty, ReflectOptions::default());
        let b = describe(&Type::ptr(&ty), ReflectOptions::default());
        let c = describe(&ty, ReflectOptions::immutable());
        assert!(Rc::ptr_eq(&a, &b));
        assert!(!Rc::ptr_eq(&a, &c));
        assert!(c.options().immutable);
    }
}
