//! Addressable storage locations

use super::types::Type;
use super::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Address of a host value: a shared cell plus a path of field/element indices
/// into the value stored there.
///
/// Pointers into a struct's interior or a slice's backing array share the cell of
/// their container, so writes through any of them are visible through all of them.
#[derive(Clone)]
pub struct Pointer {
    cell: Rc<RefCell<Value>>,
    path: Vec<usize>,
}

impl Pointer {
    /// Allocate fresh storage holding `value`
    pub fn alloc(value: Value) -> Self {
        Self {
            cell: Rc::new(RefCell::new(value)),
            path: Vec::new(),
        }
    }

    /// Copy of the value currently stored at this address
    pub fn get(&self) -> Value {
        self.with(Value::clone)
    }

    /// Type of the value stored at this address
    pub fn elem_type(&self) -> Type {
        self.with(|value| value.ty().clone())
    }

    pub fn with<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        let root = self.cell.borrow();
        f(root.walk(&self.path))
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        let mut root = self.cell.borrow_mut();
        f(root.walk_mut(&self.path))
    }

    /// Overwrite the stored value
    pub fn set(&self, value: Value) {
        self.update(|slot| *slot = value);
    }

    /// Address of field or element `index` of the stored struct/array
    pub fn child(&self, index: usize) -> Pointer {
        let mut path = self.path.clone();
        path.push(index);
        Self {
            cell: Rc::clone(&self.cell),
            path,
        }
    }

    /// Address reached by following `path` from the stored value
    pub fn descend(&self, path: &[usize]) -> Pointer {
        let mut full = self.path.clone();
        full.extend_from_slice(path);
        Self {
            cell: Rc::clone(&self.cell),
            path: full,
        }
    }

    pub fn same_address(&self, other: &Pointer) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell) && self.path == other.path
    }

    /// Numeric address used for display and map keys
    pub(crate) fn address(&self) -> usize {
        let base = Rc::as_ptr(&self.cell) as *const u8 as usize;
        self.path
            .iter()
            .fold(base, |acc, index| acc.wrapping_add((index + 1) * 8))
    }

    pub(crate) fn path(&self) -> &[usize] {
        &self.path
    }
}

impl std::fmt::Debug for Pointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Pointer({:#x})", self.address())
    }
}
