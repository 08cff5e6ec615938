use std::{cell::RefCell, fmt, rc::Rc};

use indexmap::IndexMap;

use crate::{ast::Stmt, memory::Handle};

#[derive(Clone)]
pub struct Value(pub Rc<ValueKind>);

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn none() -> Self {
        Self::new(ValueKind::None)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ValueKind::Bool(value))
    }

    pub fn number(value: f64) -> Self {
        Self::new(ValueKind::Number(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ValueKind::String(value.into()))
    }

    pub fn list(values: Vec<Value>) -> Self {
        Self::new(ValueKind::List(values))
    }

    pub fn map(entries: IndexMap<String, Value>) -> Self {
        Self::new(ValueKind::Map(entries))
    }

    pub fn function(def: FunctionDef) -> Self {
        Self::new(ValueKind::Function(Rc::new(def)))
    }

    pub fn class(def: Rc<ClassDef>) -> Self {
        Self::new(ValueKind::Class(def))
    }

    pub fn object(instance: ObjectInstance) -> Self {
        Self::new(ValueKind::Object(Rc::new(RefCell::new(instance))))
    }

    pub fn handle(handle: Handle) -> Self {
        Self::new(ValueKind::Handle(handle))
    }

    pub fn is_truthy(&self) -> bool {
        match &*self.0 {
            ValueKind::None => false,
            ValueKind::Bool(b) => *b,
            ValueKind::Number(n) => *n != 0.0,
            ValueKind::String(s) => !s.is_empty(),
            ValueKind::List(values) => !values.is_empty(),
            ValueKind::Map(map) => !map.is_empty(),
            ValueKind::Function(_) | ValueKind::Class(_) | ValueKind::Object(_) => true,
            ValueKind::Handle(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match &*self.0 {
            ValueKind::None => "None",
            ValueKind::Bool(_) => "Bool",
            ValueKind::Number(_) => "Number",
            ValueKind::String(_) => "String",
            ValueKind::List(_) => "List",
            ValueKind::Map(_) => "Map",
            ValueKind::Function(_) => "Function",
            ValueKind::Class(_) => "Class",
            ValueKind::Object(_) => "Object",
            ValueKind::Handle(_) => "Handle",
        }
    }

    /// Numeric strings parse here; booleans become 1 or 0.
    pub fn as_number(&self) -> Option<f64> {
        match &*self.0 {
            ValueKind::Number(n) => Some(*n),
            ValueKind::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            ValueKind::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &*self.0 {
            ValueKind::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<&Handle> {
        match &*self.0 {
            ValueKind::Handle(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn is_error_string(&self) -> bool {
        matches!(&*self.0, ValueKind::String(s) if s.starts_with("Error:"))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (&*self.0, &*other.0) {
            (ValueKind::None, ValueKind::None) => true,
            (ValueKind::Bool(a), ValueKind::Bool(b)) => a == b,
            (ValueKind::Number(a), ValueKind::Number(b)) => a == b,
            (ValueKind::String(a), ValueKind::String(b)) => a == b,
            (ValueKind::List(a), ValueKind::List(b)) => a == b,
            (ValueKind::Map(a), ValueKind::Map(b)) => a == b,
            (ValueKind::Function(a), ValueKind::Function(b)) => Rc::ptr_eq(a, b),
            (ValueKind::Class(a), ValueKind::Class(b)) => Rc::ptr_eq(a, b),
            (ValueKind::Object(a), ValueKind::Object(b)) => Rc::ptr_eq(a, b),
            (ValueKind::Handle(a), ValueKind::Handle(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::String(s) => write!(f, "\"{s}\""),
            _ => write!(f, "{self}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::None => write!(f, "none"),
            ValueKind::Bool(b) => write!(f, "{b}"),
            ValueKind::Number(n) => write!(f, "{n}"),
            ValueKind::String(s) => write!(f, "{s}"),
            ValueKind::List(values) => {
                write!(f, "[")?;
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value:?}")?;
                }
                write!(f, "]")
            }
            ValueKind::Map(map) => {
                write!(f, "{{")?;
                for (idx, (key, value)) in map.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value:?}")?;
                }
                write!(f, "}}")
            }
            ValueKind::Function(fun) => write!(f, "<fn {}>", fun.name),
            ValueKind::Class(class) => write!(f, "<class {}>", class.name),
            ValueKind::Object(instance) => {
                write!(f, "<{} instance>", instance.borrow().class.name)
            }
            ValueKind::Handle(handle) => write!(f, "{handle}"),
        }
    }
}

pub enum ValueKind {
    None,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    Function(Rc<FunctionDef>),
    Class(Rc<ClassDef>),
    Object(Rc<RefCell<ObjectInstance>>),
    Handle(Handle),
}

pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

pub struct ClassDef {
    pub name: String,
    pub attributes: IndexMap<String, Value>,
    pub methods: IndexMap<String, Rc<FunctionDef>>,
}

pub struct ObjectInstance {
    pub class: Rc<ClassDef>,
    pub attributes: IndexMap<String, Value>,
}
