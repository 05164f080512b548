//! Reference payloads: slices, maps, channels and funcs

use super::pointer::Pointer;
use super::types::Type;
use super::value::{Data, Value};
use crate::error::Error;
use mlua::Lua;
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

/// Slice header: a window onto a shared backing array
#[derive(Clone)]
pub struct Slice {
    backing: Pointer,
    offset: usize,
    len: usize,
    cap: usize,
}

impl Slice {
    /// Slice over fresh storage holding `items`, with `cap - items.len()` zeroed
    /// slots of headroom
    pub(crate) fn from_items(elem: &Type, mut items: Vec<Value>, cap: usize) -> Self {
        let len = items.len();
        let cap = cap.max(len);
        items.extend((len..cap).map(|_| elem.zero()));
        let backing = Value::from_parts(Type::array(elem, cap), Data::Array(items));
        Self {
            backing: Pointer::alloc(backing),
            offset: 0,
            len,
            cap,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Address of element `index`; slice elements are always addressable
    pub fn element(&self, index: usize) -> Option<Pointer> {
        (index < self.len).then(|| self.backing.child(self.offset + index))
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.element(index).map(|p| p.get())
    }

    /// Store `value` at `index`; returns false when out of range
    pub fn set(&self, index: usize, value: Value) -> bool {
        match self.element(index) {
            Some(slot) => {
                slot.set(value);
                true
            }
            None => false,
        }
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.backing.with(|array| match array.data() {
            Data::Array(items) => items[self.offset..self.offset + self.len].to_vec(),
            _ => Vec::new(),
        })
    }

    /// Header for `self` extended by `values`.
    ///
    /// Writes into the shared backing array while capacity allows; otherwise copies
    /// into a larger array, leaving the original untouched.
    pub fn append(&self, elem: &Type, values: Vec<Value>) -> Slice {
        let needed = self.len + values.len();
        if needed <= self.cap {
            for (i, value) in values.into_iter().enumerate() {
                self.backing.child(self.offset + self.len + i).set(value);
            }
            return Slice {
                backing: self.backing.clone(),
                offset: self.offset,
                len: needed,
                cap: self.cap,
            };
        }

        let grown = if self.cap < 256 {
            (self.cap * 2).max(needed)
        } else {
            (self.cap + self.cap / 4).max(needed)
        };
        let mut items = self.to_vec();
        items.extend(values);
        Slice::from_items(elem, items, grown)
    }

    pub fn same_backing(&self, other: &Slice) -> bool {
        self.backing.same_address(&other.backing)
            && self.offset == other.offset
            && self.len == other.len
    }

    pub(crate) fn address(&self) -> usize {
        self.backing.child(self.offset).address()
    }
}

/// Comparable projection of a map key
#[derive(Debug, Clone)]
pub enum MapKey {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    String(String),
    Address(usize, Vec<usize>),
}

impl MapKey {
    pub fn from_value(value: &Value) -> Result<Self, Error> {
        Ok(match value.data() {
            Data::Bool(b) => MapKey::Bool(*b),
            Data::Int(i) => MapKey::Int(*i),
            Data::Uint(u) => MapKey::Uint(*u),
            Data::Float(f) => MapKey::Float(*f),
            Data::String(s) => MapKey::String(s.clone()),
            Data::Ptr(Some(p)) => MapKey::Address(p.address(), p.path().to_vec()),
            Data::Chan(Some(c)) => MapKey::Address(c.address(), Vec::new()),
            Data::Ptr(None) | Data::Chan(None) | Data::Interface(None) => {
                MapKey::Address(0, Vec::new())
            }
            Data::Interface(Some(inner)) => return MapKey::from_value(inner),
            _ => {
                return Err(Error::Unsupported(format!(
                    "unhashable map key type {}",
                    value.ty()
                )))
            }
        })
    }

    fn rank(&self) -> u8 {
        match self {
            MapKey::Bool(_) => 0,
            MapKey::Int(_) => 1,
            MapKey::Uint(_) => 2,
            MapKey::Float(_) => 3,
            MapKey::String(_) => 4,
            MapKey::Address(..) => 5,
        }
    }
}

impl Ord for MapKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (MapKey::Bool(a), MapKey::Bool(b)) => a.cmp(b),
            (MapKey::Int(a), MapKey::Int(b)) => a.cmp(b),
            (MapKey::Uint(a), MapKey::Uint(b)) => a.cmp(b),
            (MapKey::Float(a), MapKey::Float(b)) => a.total_cmp(b),
            (MapKey::String(a), MapKey::String(b)) => a.cmp(b),
            (MapKey::Address(a, pa), MapKey::Address(b, pb)) => a.cmp(b).then_with(|| pa.cmp(pb)),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for MapKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for MapKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MapKey {}

/// Shared map storage, iterated in key order
#[derive(Clone, Default)]
pub struct Map(Rc<RefCell<BTreeMap<MapKey, (Value, Value)>>>);

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn get(&self, key: &Value) -> Result<Option<Value>, Error> {
        let key = MapKey::from_value(key)?;
        Ok(self.0.borrow().get(&key).map(|(_, value)| value.clone()))
    }

    pub fn insert(&self, key: Value, value: Value) -> Result<(), Error> {
        let projected = MapKey::from_value(&key)?;
        self.0.borrow_mut().insert(projected, (key, value));
        Ok(())
    }

    pub fn remove(&self, key: &Value) -> Result<Option<Value>, Error> {
        let key = MapKey::from_value(key)?;
        Ok(self.0.borrow_mut().remove(&key).map(|(_, value)| value))
    }

    /// Snapshot of all entries in key order
    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.0.borrow().values().cloned().collect()
    }

    pub fn same(&self, other: &Map) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn address(&self) -> usize {
        Rc::as_ptr(&self.0) as *const u8 as usize
    }
}

struct ChanState {
    cap: usize,
    queue: RefCell<VecDeque<Value>>,
    closed: Cell<bool>,
}

/// Buffered channel handle.
///
/// Scripts only see identity and declared methods; sends and receives are
/// performed by host code.
#[derive(Clone)]
pub struct Chan(Rc<ChanState>);

impl Chan {
    pub fn new(cap: usize) -> Self {
        Chan(Rc::new(ChanState {
            cap,
            queue: RefCell::new(VecDeque::new()),
            closed: Cell::new(false),
        }))
    }

    pub fn cap(&self) -> usize {
        self.0.cap
    }

    pub fn len(&self) -> usize {
        self.0.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.queue.borrow().is_empty()
    }

    /// Queue `value` without blocking
    pub fn send(&self, value: Value) -> Result<(), Error> {
        if self.0.closed.get() {
            return Err(Error::Unsupported("send on closed channel".into()));
        }
        let mut queue = self.0.queue.borrow_mut();
        if queue.len() >= self.0.cap {
            return Err(Error::Unsupported("send on full channel".into()));
        }
        queue.push_back(value);
        Ok(())
    }

    pub fn try_recv(&self) -> Option<Value> {
        self.0.queue.borrow_mut().pop_front()
    }

    pub fn close(&self) {
        self.0.closed.set(true);
    }

    pub fn is_closed(&self) -> bool {
        self.0.closed.get()
    }

    pub fn same(&self, other: &Chan) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn address(&self) -> usize {
        Rc::as_ptr(&self.0) as *const u8 as usize
    }
}

type FuncBody = dyn Fn(&Lua, &[Value]) -> Result<Vec<Value>, Error>;

/// Host callable
#[derive(Clone)]
pub struct Func(Rc<FuncBody>);

impl Func {
    pub fn new(f: impl Fn(&Lua, &[Value]) -> Result<Vec<Value>, Error> + 'static) -> Self {
        Func(Rc::new(f))
    }

    pub fn call(&self, lua: &Lua, args: &[Value]) -> Result<Vec<Value>, Error> {
        (self.0)(lua, args)
    }

    pub fn same(&self, other: &Func) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn address(&self) -> usize {
        Rc::as_ptr(&self.0) as *const u8 as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<Value> {
        items.iter().map(|s| Value::from(*s)).collect()
    }

    #[test]
    fn test_append_within_capacity_shares_backing() {
        let elem = Type::string();
        let base = Slice::from_items(&elem, Vec::new(), 10);
        let grown = base.append(&elem, strings(&["hello", "world"]));

        assert_eq!(grown.len(), 2);
        assert_eq!(grown.cap(), 10);
        assert!(grown.backing.same_address(&base.backing));
        assert_eq!(base.len(), 0);
    }

    #[test]
    fn test_append_past_capacity_copies() {
        let elem = Type::string();
        let base = Slice::from_items(&elem, strings(&["a"]), 1);
        let grown = base.append(&elem, strings(&["b"]));

        assert_eq!(grown.len(), 2);
        assert!(grown.cap() >= 2);
        grown.set(0, Value::from("z"));
        assert_eq!(base.get(0).unwrap().as_str(), Some("a"));
    }

    #[test]
    fn test_map_key_order() {
        let map = Map::new();
        map.insert(Value::from("b"), Value::from(2)).unwrap();
        map.insert(Value::from("a"), Value::from(1)).unwrap();
        let keys: Vec<String> = map
            .entries()
            .into_iter()
            .map(|(k, _)| k.to_string())
            .collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(map.get(&Value::from("a")).unwrap().unwrap().as_int(), Some(1));
    }

    #[test]
    fn test_chan_buffer() {
        let chan = Chan::new(1);
        chan.send(Value::from("x")).unwrap();
        assert!(chan.send(Value::from("y")).is_err());
        assert_eq!(chan.len(), 1);
        assert_eq!(chan.try_recv().unwrap().as_str(), Some("x"));
        chan.close();
        assert!(chan.send(Value::from("z")).is_err());
    }
}
