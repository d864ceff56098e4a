use serde::Deserialize;

/// The closed set of node kinds the engine understands.
///
/// The AST arrives pre-parsed (the CLI deserializes it from JSON); the engine
/// only requires that every node carries one of these kinds. Dispatch over
/// them is always an exhaustive `match`, so adding a kind forces every walker
/// to decide what to do with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    // Structure
    StmtList,
    Namespace,
    Class,
    PropertyGroup,
    PropertyElem,
    ClassConstGroup,
    ClassConstElem,
    ConstElem,
    Method,
    Function,
    Closure,
    ParamList,
    Param,
    ArgList,
    NameList,
    TypeAnno,
    // Expressions
    Name,
    Var,
    Assign,
    AssignRef,
    Dim,
    Prop,
    StaticProp,
    ClassConst,
    Array,
    ArrayElem,
    List,
    Call,
    MethodCall,
    StaticCall,
    New,
    Spread,
    BinaryOp,
    UnaryOp,
    IntLit,
    FloatLit,
    StringLit,
    BoolLit,
    NullLit,
    // Statements
    If,
    IfElem,
    Switch,
    SwitchCase,
    While,
    Foreach,
    Return,
    Echo,
    /// Placeholder for an absent child in a fixed positional slot.
    Missing,
}

/// Declaration modifier bits carried in [`Node::flags`].
pub mod flags {
    pub const PUBLIC: u32 = 1 << 0;
    pub const PROTECTED: u32 = 1 << 1;
    pub const PRIVATE: u32 = 1 << 2;
    pub const STATIC: u32 = 1 << 3;
    pub const ABSTRACT: u32 = 1 << 4;
    pub const FINAL: u32 = 1 << 5;
    pub const BY_REF: u32 = 1 << 6;
    pub const VARIADIC: u32 = 1 << 7;
    pub const INTERFACE: u32 = 1 << 8;
    pub const TRAIT: u32 = 1 << 9;
    pub const DEPRECATED: u32 = 1 << 10;
}

/// A literal value attached to an `IntLit` / `FloatLit` / `StringLit` /
/// `BoolLit` node.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// One node of the externally supplied syntax tree.
///
/// Children are positional; kinds with optional slots use [`NodeKind::Missing`]
/// placeholders so slot indexes stay fixed. The slot conventions per kind:
///
/// - `Namespace`: name = namespace; `[body: StmtList]`
/// - `Class`: name, flags, doc_comment;
///   `[extends: Name|Missing, implements: NameList, uses: NameList, body: StmtList]`
/// - `Method`/`Function`: name, flags, doc_comment;
///   `[params: ParamList, return: TypeAnno|Missing, body: StmtList|Missing]`
/// - `Closure`: `[params: ParamList, return: TypeAnno|Missing, uses: ParamList, body: StmtList]`
/// - `Param`: name, flags; `[type: TypeAnno|Missing, default: expr|Missing]`
/// - `PropertyGroup`: flags; `[type: TypeAnno|Missing, elems: PropertyElem...]`
/// - `PropertyElem`: name; `[default: expr|Missing]`
/// - `ClassConstGroup`: `[elems: ClassConstElem...]`; `ClassConstElem`/`ConstElem`: name; `[value]`
/// - `TypeAnno`: name = raw type string (e.g. `"int|string"`, `"\Foo[]"`)
/// - `Assign`/`AssignRef`: `[target, value]`
/// - `Dim`: `[base, index|Missing]`; `Prop`: name; `[object]`;
///   `StaticProp`/`ClassConst`: name; `[class: Name]`
/// - `Array`: `[ArrayElem...]`; `ArrayElem`: `[value, key|Missing]`; `List`: `[targets...]`
/// - `Call`: `[callee, ArgList]`; `MethodCall`: name; `[object, ArgList]`;
///   `StaticCall`: name; `[class: Name, ArgList]`; `New`: `[class: Name, ArgList]`
/// - `BinaryOp`/`UnaryOp`: name = operator lexeme; `[operands...]`
/// - `If`: `[IfElem...]`; `IfElem`: `[cond|Missing, body: StmtList]`
/// - `Switch`: `[cond, SwitchCase...]`; `SwitchCase`: `[value|Missing, body: StmtList]`
/// - `While`: `[cond, body]`; `Foreach`: `[iterable, value: Var, key: Var|Missing, body]`
/// - `Return`: `[expr|Missing]`; `Echo`: `[exprs...]`
#[derive(Debug, Clone, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub children: Vec<Node>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<Scalar>,
    #[serde(default)]
    pub doc_comment: Option<String>,
    #[serde(default)]
    pub flags: u32,
}

impl Node {
    pub fn new(kind: NodeKind, line: u32) -> Self {
        Self {
            kind,
            line,
            children: Vec::new(),
            name: None,
            value: None,
            doc_comment: None,
            flags: 0,
        }
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc_comment = Some(doc.into());
        self
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.children
            .get(index)
            .filter(|child| child.kind != NodeKind::Missing)
    }

    pub fn is_missing(&self) -> bool {
        self.kind == NodeKind::Missing
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    pub fn name_or_empty(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    // Convenience constructors, used pervasively by the tests and handy when
    // embedding the engine without a JSON front end.

    pub fn missing() -> Self {
        Self::new(NodeKind::Missing, 0)
    }

    pub fn stmt_list(line: u32, statements: Vec<Node>) -> Self {
        Self::new(NodeKind::StmtList, line).with_children(statements)
    }

    pub fn var(name: impl Into<String>, line: u32) -> Self {
        Self::new(NodeKind::Var, line).with_name(name)
    }

    pub fn name_ref(name: impl Into<String>, line: u32) -> Self {
        Self::new(NodeKind::Name, line).with_name(name)
    }

    pub fn int(value: i64, line: u32) -> Self {
        let mut node = Self::new(NodeKind::IntLit, line);
        node.value = Some(Scalar::Int(value));
        node
    }

    pub fn float(value: f64, line: u32) -> Self {
        let mut node = Self::new(NodeKind::FloatLit, line);
        node.value = Some(Scalar::Float(value));
        node
    }

    pub fn string(value: impl Into<String>, line: u32) -> Self {
        let mut node = Self::new(NodeKind::StringLit, line);
        node.value = Some(Scalar::Str(value.into()));
        node
    }

    pub fn bool(value: bool, line: u32) -> Self {
        let mut node = Self::new(NodeKind::BoolLit, line);
        node.value = Some(Scalar::Bool(value));
        node
    }

    pub fn null(line: u32) -> Self {
        Self::new(NodeKind::NullLit, line)
    }

    pub fn assign(target: Node, value: Node, line: u32) -> Self {
        Self::new(NodeKind::Assign, line).with_children(vec![target, value])
    }

    pub fn dim(base: Node, index: Option<Node>, line: u32) -> Self {
        Self::new(NodeKind::Dim, line)
            .with_children(vec![base, index.unwrap_or_else(Node::missing)])
    }

    pub fn prop(object: Node, name: impl Into<String>, line: u32) -> Self {
        Self::new(NodeKind::Prop, line)
            .with_name(name)
            .with_children(vec![object])
    }

    pub fn call(name: impl Into<String>, args: Vec<Node>, line: u32) -> Self {
        Self::new(NodeKind::Call, line).with_children(vec![
            Self::name_ref(name, line),
            Self::new(NodeKind::ArgList, line).with_children(args),
        ])
    }

    pub fn method_call(object: Node, name: impl Into<String>, args: Vec<Node>, line: u32) -> Self {
        Self::new(NodeKind::MethodCall, line)
            .with_name(name)
            .with_children(vec![
                object,
                Self::new(NodeKind::ArgList, line).with_children(args),
            ])
    }

    pub fn static_call(
        class: impl Into<String>,
        name: impl Into<String>,
        args: Vec<Node>,
        line: u32,
    ) -> Self {
        Self::new(NodeKind::StaticCall, line)
            .with_name(name)
            .with_children(vec![
                Self::name_ref(class, line),
                Self::new(NodeKind::ArgList, line).with_children(args),
            ])
    }

    pub fn new_object(class: impl Into<String>, args: Vec<Node>, line: u32) -> Self {
        Self::new(NodeKind::New, line).with_children(vec![
            Self::name_ref(class, line),
            Self::new(NodeKind::ArgList, line).with_children(args),
        ])
    }

    pub fn binary_op(op: impl Into<String>, left: Node, right: Node, line: u32) -> Self {
        Self::new(NodeKind::BinaryOp, line)
            .with_name(op)
            .with_children(vec![left, right])
    }

    pub fn ret(expr: Option<Node>, line: u32) -> Self {
        Self::new(NodeKind::Return, line)
            .with_children(vec![expr.unwrap_or_else(Node::missing)])
    }

    pub fn if_stmt(arms: Vec<(Option<Node>, Vec<Node>)>, line: u32) -> Self {
        let elems = arms
            .into_iter()
            .map(|(cond, body)| {
                Self::new(NodeKind::IfElem, line).with_children(vec![
                    cond.unwrap_or_else(Node::missing),
                    Self::stmt_list(line, body),
                ])
            })
            .collect();
        Self::new(NodeKind::If, line).with_children(elems)
    }

    pub fn param(name: impl Into<String>, type_anno: Option<&str>, line: u32) -> Self {
        Self::new(NodeKind::Param, line)
            .with_name(name)
            .with_children(vec![
                type_anno
                    .map(|raw| Self::new(NodeKind::TypeAnno, line).with_name(raw))
                    .unwrap_or_else(Node::missing),
                Node::missing(),
            ])
    }

    pub fn function(
        name: impl Into<String>,
        params: Vec<Node>,
        return_anno: Option<&str>,
        body: Vec<Node>,
        line: u32,
    ) -> Self {
        Self::new(NodeKind::Function, line)
            .with_name(name)
            .with_children(vec![
                Self::new(NodeKind::ParamList, line).with_children(params),
                return_anno
                    .map(|raw| Self::new(NodeKind::TypeAnno, line).with_name(raw))
                    .unwrap_or_else(Node::missing),
                Self::stmt_list(line, body),
            ])
    }
}

/// Deserializes an AST dump produced by the companion exporter.
pub fn from_json(text: &str) -> Result<Node, serde_json::Error> {
    serde_json::from_str(text)
}
