//! 类型层级
//!
//! Rust 没有类继承，资源之间的"子类型"关系需要显式声明。
//! `TypeHierarchy` 记录每个类型声明的直接父类型，并实现唯一的兼容性判断：
//! 当 `offered` 等于 `required` 或者是它的（传递）后代时，`offered` 兼容 `required`。

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Identity of a Rust type as seen by the registry.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: Any + ?Sized>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Full type path, e.g. `alloc::string::String`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment, generics left intact.
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        match base.rfind("::") {
            Some(pos) => &self.name[pos + 2..],
            None => self.name,
        }
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// 显式类型层级表：类型 -> 直接父类型
#[derive(Debug, Clone, Default)]
pub struct TypeHierarchy {
    supertypes: HashMap<TypeKey, Vec<TypeKey>>,
}

impl TypeHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// 声明 `Sub` 是 `Super` 的子类型
    pub fn with_subtype<Sub: Any + ?Sized, Super: Any + ?Sized>(mut self) -> Self {
        self.declare(TypeKey::of::<Sub>(), TypeKey::of::<Super>());
        self
    }

    /// Records `sub <: sup`. Self-edges and duplicates are ignored.
    pub fn declare(&mut self, sub: TypeKey, sup: TypeKey) {
        if sub == sup {
            return;
        }
        let parents = self.supertypes.entry(sub).or_default();
        if !parents.contains(&sup) {
            parents.push(sup);
        }
    }

    /// Freezes the table for sharing between modules and providers.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Direct supertypes declared for `ty`.
    pub fn supertypes(&self, ty: &TypeKey) -> &[TypeKey] {
        self.supertypes.get(ty).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 兼容性判断：`offered` 是否可以用在需要 `required` 的位置
    pub fn is_compatible(&self, required: &TypeKey, offered: &TypeKey) -> bool {
        if required == offered {
            return true;
        }

        // 广度优先遍历祖先；层级表可能被错误地声明成环，用 visited 兜住
        let mut visited = HashSet::new();
        let mut queue: VecDeque<TypeKey> = self.supertypes(offered).iter().copied().collect();
        while let Some(current) = queue.pop_front() {
            if current == *required {
                return true;
            }
            if visited.insert(current) {
                queue.extend(self.supertypes(&current).iter().copied());
            }
        }
        false
    }

    /// `sub` is a descendant of `sup` and not `sup` itself.
    pub fn is_strict_subtype(&self, sup: &TypeKey, sub: &TypeKey) -> bool {
        sup != sub && self.is_compatible(sup, sub)
    }
}
