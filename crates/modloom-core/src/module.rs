//! Editable binary modules.
//!
//! A [`Module`] is an arena of type nodes indexed by [`TypeId`], each type
//! owning its members. Storage is copy-on-write: cloning a module shares
//! every node, and a mutation only copies the node it touches (plus the
//! outer index). That makes a pool snapshot an O(1) structural copy.
//!
//! Turning bytes into a module and back is the job of a [`ModuleCodec`];
//! [`PostcardCodec`] is the built-in implementation.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use thiserror::Error;

/// Identity of a module inside the pool.
///
/// Like package ids, module ids compare case-insensitively and keep the
/// spelling they were created with for display, so a module loaded for
/// `lib` is the same pool entry a patcher reaches through `Lib`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ModuleId {
    display: String,
    key: String,
}

impl ModuleId {
    pub fn new(name: impl Into<String>) -> Self {
        let display = name.into();
        let key = display.to_lowercase();
        Self { display, key }
    }

    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// The lower-case key used for equality, hashing and ordering.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PartialEq for ModuleId {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ModuleId {}

impl Hash for ModuleId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for ModuleId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ModuleId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display)
    }
}

impl From<&str> for ModuleId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ModuleId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<ModuleId> for String {
    fn from(id: ModuleId) -> Self {
        id.display
    }
}

impl From<&modloom_schema::PackageId> for ModuleId {
    fn from(id: &modloom_schema::PackageId) -> Self {
        Self::new(id.as_str())
    }
}

/// Index of a type within one module.
///
/// Stable until the next [`Module::remove_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(usize);

impl TypeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberKind {
    Field,
    Method,
    Property,
}

/// A field, method or property, with its raw body (IL, signature blob, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub kind: MemberKind,
    #[serde(default)]
    pub body: Vec<u8>,
}

impl Member {
    pub fn new(name: impl Into<String>, kind: MemberKind) -> Self {
        Self {
            name: name.into(),
            kind,
            body: Vec::new(),
        }
    }

    pub fn method(name: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Method,
            body: body.into(),
        }
    }

    pub fn field(name: impl Into<String>) -> Self {
        Self::new(name, MemberKind::Field)
    }
}

/// A type node: fully-qualified name, members, optional static initializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    pub full_name: String,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub initializer: Option<Vec<u8>>,
}

impl TypeDef {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            members: Vec::new(),
            initializer: None,
        }
    }

    /// Builder-style member insertion.
    pub fn with_member(mut self, member: Member) -> Self {
        self.add_member(member);
        self
    }

    /// Add a member, replacing one with the same name and kind.
    pub fn add_member(&mut self, member: Member) {
        match self
            .members
            .iter_mut()
            .find(|m| m.name == member.name && m.kind == member.kind)
        {
            Some(existing) => *existing = member,
            None => self.members.push(member),
        }
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn member_mut(&mut self, name: &str) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.name == name)
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.member(name).is_some()
    }

    /// Rename a member. Returns false if `from` does not exist.
    pub fn rename_member(&mut self, from: &str, to: impl Into<String>) -> bool {
        match self.member_mut(from) {
            Some(member) => {
                member.name = to.into();
                true
            }
            None => false,
        }
    }

    pub fn remove_member(&mut self, name: &str) -> Option<Member> {
        let idx = self.members.iter().position(|m| m.name == name)?;
        Some(self.members.remove(idx))
    }

    pub fn methods(&self) -> impl Iterator<Item = &Member> {
        self.members.iter().filter(|m| m.kind == MemberKind::Method)
    }
}

/// An editable module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    name: String,
    types: Arc<Vec<Arc<TypeDef>>>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: Arc::new(Vec::new()),
        }
    }

    /// Builder-style type insertion.
    pub fn with_type(mut self, ty: TypeDef) -> Self {
        self.add_type(ty);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> ModuleId {
        ModuleId::new(self.name.clone())
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.iter().map(AsRef::as_ref)
    }

    pub fn type_names(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.full_name.as_str()).collect()
    }

    pub fn type_id(&self, full_name: &str) -> Option<TypeId> {
        self.types
            .iter()
            .position(|t| t.full_name == full_name)
            .map(TypeId)
    }

    pub fn get(&self, id: TypeId) -> Option<&TypeDef> {
        self.types.get(id.0).map(AsRef::as_ref)
    }

    /// Mutable access to one type, copying only that node if it is shared.
    pub fn get_mut(&mut self, id: TypeId) -> Option<&mut TypeDef> {
        if id.0 >= self.types.len() {
            return None;
        }
        Arc::make_mut(&mut self.types).get_mut(id.0).map(Arc::make_mut)
    }

    pub fn type_by_name(&self, full_name: &str) -> Option<&TypeDef> {
        self.type_id(full_name).and_then(|id| self.get(id))
    }

    pub fn type_by_name_mut(&mut self, full_name: &str) -> Option<&mut TypeDef> {
        let id = self.type_id(full_name)?;
        self.get_mut(id)
    }

    /// Add a type, replacing an existing type of the same name in place.
    pub fn add_type(&mut self, ty: TypeDef) -> TypeId {
        if let Some(id) = self.type_id(&ty.full_name) {
            Arc::make_mut(&mut self.types)[id.0] = Arc::new(ty);
            return id;
        }
        let types = Arc::make_mut(&mut self.types);
        types.push(Arc::new(ty));
        TypeId(types.len() - 1)
    }

    /// Remove a type. Invalidates [`TypeId`]s handed out earlier.
    pub fn remove_type(&mut self, full_name: &str) -> Option<TypeDef> {
        let id = self.type_id(full_name)?;
        let removed = Arc::make_mut(&mut self.types).remove(id.0);
        Some(Arc::unwrap_or_clone(removed))
    }

    /// True when both modules still share the same type storage, i.e. one is
    /// an untouched copy of the other.
    pub fn shares_storage_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.types, &other.types)
    }
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Not a module image (bad magic)")]
    BadMagic,

    #[error("Unsupported module format version {0}")]
    UnsupportedVersion(u8),

    #[error("Corrupt module image: {0}")]
    Corrupt(String),

    #[error("Failed to encode module '{module}': {reason}")]
    Encode { module: String, reason: String },
}

/// The module-format capability: parse bytes into an editable module and
/// serialize it back.
pub trait ModuleCodec: Send + Sync + std::fmt::Debug {
    /// Parse a module image.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the bytes are not a valid image.
    fn parse(&self, bytes: &[u8]) -> Result<Module, CodecError>;

    /// Serialize a module into an image.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the module cannot be encoded.
    fn serialize(&self, module: &Module) -> Result<Vec<u8>, CodecError>;
}

/// Built-in codec: a 4-byte magic, a format version byte, then postcard.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostcardCodec;

impl PostcardCodec {
    pub const MAGIC: [u8; 4] = *b"MLMD";
    pub const FORMAT_VERSION: u8 = 1;
}

impl ModuleCodec for PostcardCodec {
    fn parse(&self, bytes: &[u8]) -> Result<Module, CodecError> {
        let body = bytes
            .strip_prefix(Self::MAGIC.as_slice())
            .ok_or(CodecError::BadMagic)?;
        let (&version, body) = body.split_first().ok_or(CodecError::BadMagic)?;
        if version != Self::FORMAT_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }
        postcard::from_bytes(body).map_err(|e| CodecError::Corrupt(e.to_string()))
    }

    fn serialize(&self, module: &Module) -> Result<Vec<u8>, CodecError> {
        let body = postcard::to_allocvec(module).map_err(|e| CodecError::Encode {
            module: module.name.clone(),
            reason: e.to_string(),
        })?;
        let mut out = Vec::with_capacity(Self::MAGIC.len() + 1 + body.len());
        out.extend_from_slice(&Self::MAGIC);
        out.push(Self::FORMAT_VERSION);
        out.extend_from_slice(&body);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Module {
        Module::new("Game.Core")
            .with_type(
                TypeDef::new("Game.Player")
                    .with_member(Member::field("health"))
                    .with_member(Member::method("Update", vec![0x2a, 0x00])),
            )
            .with_type(TypeDef::new("Game.World"))
    }

    #[test]
    fn test_module_ids_ignore_case() {
        let lower = ModuleId::new("harmony");
        let upper = ModuleId::from(&"Harmony".parse::<modloom_schema::PackageId>().unwrap());
        assert_eq!(lower, upper);
        assert_eq!(upper.to_string(), "Harmony");

        let mut set = std::collections::HashSet::new();
        set.insert(lower);
        assert!(set.contains(&ModuleId::new("HARMONY")));
    }

    #[test]
    fn test_lookup_by_name() {
        let module = sample();
        assert_eq!(module.type_count(), 2);
        assert_eq!(module.type_names(), vec!["Game.Player", "Game.World"]);
        let player = module.type_by_name("Game.Player").unwrap();
        assert!(player.has_member("Update"));
        assert_eq!(player.methods().count(), 1);
        assert!(module.type_by_name("Game.Missing").is_none());
    }

    #[test]
    fn test_clone_is_copy_on_write() {
        let original = sample();
        let mut copy = original.clone();
        assert!(copy.shares_storage_with(&original));

        copy.type_by_name_mut("Game.Player")
            .unwrap()
            .rename_member("Update", "Tick");

        assert!(!copy.shares_storage_with(&original));
        assert!(original.type_by_name("Game.Player").unwrap().has_member("Update"));
        assert!(copy.type_by_name("Game.Player").unwrap().has_member("Tick"));
        // Untouched nodes stay shared.
        assert!(Arc::ptr_eq(&original.types[1], &copy.types[1]));
    }

    #[test]
    fn test_add_and_remove_types() {
        let mut module = sample();
        let id = module.add_type(TypeDef::new("Game.World").with_member(Member::field("seed")));
        assert_eq!(id.index(), 1);
        assert_eq!(module.type_count(), 2);
        assert!(module.get(id).unwrap().has_member("seed"));

        let removed = module.remove_type("Game.Player").unwrap();
        assert_eq!(removed.full_name, "Game.Player");
        assert_eq!(module.type_id("Game.World"), Some(TypeId(0)));
    }

    #[test]
    fn test_member_editing() {
        let mut ty = TypeDef::new("T").with_member(Member::method("A", vec![1]));
        ty.add_member(Member::method("A", vec![2]));
        assert_eq!(ty.members.len(), 1);
        assert_eq!(ty.member("A").unwrap().body, vec![2]);
        assert!(!ty.rename_member("missing", "x"));
        assert!(ty.remove_member("A").is_some());
        assert!(ty.members.is_empty());
    }

    #[test]
    fn test_postcard_codec() {
        let codec = PostcardCodec;
        let module = sample();
        let bytes = codec.serialize(&module).unwrap();
        assert!(bytes.starts_with(&PostcardCodec::MAGIC));
        assert_eq!(codec.parse(&bytes).unwrap(), module);
    }

    #[test]
    fn test_codec_rejects_garbage() {
        let codec = PostcardCodec;
        assert!(matches!(codec.parse(b"nope"), Err(CodecError::BadMagic)));
        assert!(matches!(
            codec.parse(b"MLMD\x09rest"),
            Err(CodecError::UnsupportedVersion(9))
        ));
        assert!(matches!(
            codec.parse(b"MLMD\x01\xff\xff\xff\xff\xff"),
            Err(CodecError::Corrupt(_))
        ));
    }
}
