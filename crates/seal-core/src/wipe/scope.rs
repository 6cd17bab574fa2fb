//! [`WipeScope`]: the per-unit-of-work set of tracked sensitive values.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;
use uuid::Uuid;

use super::secret::{Identity, KeyMaterial, SecretBytes, SecretText, Tracked};
use super::WipeError;

/// A value (or group of values) to be tracked for destruction.
///
/// Nested [`WipeItem::Many`] groups are flattened so every leaf handle is
/// tracked individually; [`WipeItem::None`] entries are skipped.
#[derive(Debug, Clone)]
pub enum WipeItem {
    Text(SecretText),
    Bytes(SecretBytes),
    Key(KeyMaterial),
    Many(Vec<WipeItem>),
    None,
}

impl From<SecretText> for WipeItem {
    fn from(v: SecretText) -> Self {
        WipeItem::Text(v)
    }
}

impl From<&SecretText> for WipeItem {
    fn from(v: &SecretText) -> Self {
        WipeItem::Text(v.clone())
    }
}

impl From<SecretBytes> for WipeItem {
    fn from(v: SecretBytes) -> Self {
        WipeItem::Bytes(v)
    }
}

impl From<&SecretBytes> for WipeItem {
    fn from(v: &SecretBytes) -> Self {
        WipeItem::Bytes(v.clone())
    }
}

impl From<KeyMaterial> for WipeItem {
    fn from(v: KeyMaterial) -> Self {
        WipeItem::Key(v)
    }
}

impl From<&KeyMaterial> for WipeItem {
    fn from(v: &KeyMaterial) -> Self {
        WipeItem::Key(v.clone())
    }
}

impl<T: Into<WipeItem>> From<Vec<T>> for WipeItem {
    fn from(v: Vec<T>) -> Self {
        WipeItem::Many(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<WipeItem>> From<Option<T>> for WipeItem {
    fn from(v: Option<T>) -> Self {
        v.map_or(WipeItem::None, Into::into)
    }
}

/// Members of one unit of work's wipe set, deduplicated by identity.
#[derive(Default)]
pub(crate) struct WipeSet {
    members: HashMap<Identity, Tracked>,
}

impl WipeSet {
    fn insert(&mut self, item: WipeItem) -> usize {
        match item {
            WipeItem::Text(t) => self.insert_one(t.identity(), || Tracked::Text(t.downgrade())),
            WipeItem::Bytes(b) => self.insert_one(b.identity(), || Tracked::Bytes(b.downgrade())),
            WipeItem::Key(k) => self.insert_one(k.identity(), || Tracked::Key(k.downgrade())),
            WipeItem::Many(items) => items.into_iter().map(|i| self.insert(i)).sum(),
            WipeItem::None => 0,
        }
    }

    fn insert_one(&mut self, id: Identity, make: impl FnOnce() -> Tracked) -> usize {
        match self.members.entry(id) {
            std::collections::hash_map::Entry::Occupied(_) => 0,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(make());
                1
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }

    pub(crate) fn into_members(self) -> Vec<Tracked> {
        self.members.into_values().collect()
    }
}

struct ScopeInner {
    id: Uuid,
    set: Mutex<Option<WipeSet>>,
}

impl ScopeInner {
    fn set(&self) -> MutexGuard<'_, Option<WipeSet>> {
        self.set.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        let leftover = self
            .set
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(set) = leftover {
            if set.len() > 0 {
                warn!(
                    scope = %self.id,
                    tracked = set.len(),
                    "wipe scope dropped without flush; destroying tracked values inline"
                );
                for member in set.into_members() {
                    member.destroy();
                }
            }
        }
    }
}

/// Handle to one unit of work's wipe set.
///
/// Cloning shares the same set, so a scope can be handed to child tasks that
/// belong to the same unit of work. Distinct scopes never see each other's
/// members. The set itself is created lazily on first registration.
#[derive(Clone)]
pub struct WipeScope {
    inner: Arc<ScopeInner>,
}

impl WipeScope {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: Uuid::new_v4(),
                set: Mutex::new(None),
            }),
        }
    }

    /// Unique identifier of this unit of work (for log correlation).
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Track one or more values for destruction when the scope is flushed.
    ///
    /// Re-registering an already tracked handle is a no-op. Returns the number
    /// of newly tracked values.
    pub fn mark(&self, item: impl Into<WipeItem>) -> usize {
        let mut guard = self.inner.set();
        guard.get_or_insert_with(WipeSet::default).insert(item.into())
    }

    /// Track a value whose concrete type is only known at runtime.
    ///
    /// Accepts the wipeable handles, plus `Vec` and `Option` of them, plus
    /// `Vec<Box<dyn Any + Send + Sync>>` groups which are expanded recursively.
    ///
    /// # Errors
    ///
    /// Returns [`WipeError::UnsupportedType`] if any value has no destruction
    /// routine. Nothing from the call is tracked in that case.
    pub fn mark_any<T: Any>(&self, value: &T) -> Result<usize, WipeError> {
        let item = classify(value, std::any::type_name::<T>())?;
        Ok(self.mark(item))
    }

    /// Swap `original` for `replacement` if `original` is currently tracked.
    ///
    /// Returns `true` when the swap happened.
    pub fn replace(&self, original: impl Into<WipeItem>, replacement: impl Into<WipeItem>) -> bool {
        let Some(id) = leaf_identity(&original.into()) else {
            return false;
        };
        let mut guard = self.inner.set();
        let Some(set) = guard.as_mut() else {
            return false;
        };
        if set.members.remove(&id).is_none() {
            return false;
        }
        set.insert(replacement.into());
        true
    }

    /// Number of values currently tracked.
    pub fn tracked_count(&self) -> usize {
        self.inner.set().as_ref().map_or(0, WipeSet::len)
    }

    /// `true` when `item` is currently tracked by this scope.
    pub fn is_tracked(&self, item: impl Into<WipeItem>) -> bool {
        let Some(id) = leaf_identity(&item.into()) else {
            return false;
        };
        self.inner
            .set()
            .as_ref()
            .is_some_and(|set| set.members.contains_key(&id))
    }

    /// Detach the current set so that later registrations start a new one.
    pub(crate) fn detach(&self) -> Option<WipeSet> {
        self.inner.set().take()
    }
}

impl std::fmt::Debug for WipeScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WipeScope")
            .field("id", &self.inner.id)
            .field("tracked", &self.tracked_count())
            .finish()
    }
}

fn leaf_identity(item: &WipeItem) -> Option<Identity> {
    match item {
        WipeItem::Text(t) => Some(t.identity()),
        WipeItem::Bytes(b) => Some(b.identity()),
        WipeItem::Key(k) => Some(k.identity()),
        WipeItem::Many(_) | WipeItem::None => None,
    }
}

macro_rules! try_downcast {
    ($value:expr, $($ty:ty),+) => {
        $(
            if let Some(v) = $value.downcast_ref::<$ty>() {
                return Ok(WipeItem::from(v.clone()));
            }
        )+
    };
}

fn classify(value: &dyn Any, type_name: &str) -> Result<WipeItem, WipeError> {
    try_downcast!(
        value,
        SecretText,
        SecretBytes,
        KeyMaterial,
        Vec<SecretText>,
        Vec<SecretBytes>,
        Vec<KeyMaterial>,
        Option<SecretText>,
        Option<SecretBytes>,
        Option<KeyMaterial>,
        WipeItem
    );
    if let Some(group) = value.downcast_ref::<Vec<Box<dyn Any + Send + Sync>>>() {
        let items = group
            .iter()
            .map(|v| classify(v.as_ref(), "Box<dyn Any>"))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(WipeItem::Many(items));
    }
    if value.is::<()>() {
        return Ok(WipeItem::None);
    }
    Err(WipeError::UnsupportedType {
        type_name: type_name.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_is_created_lazily() {
        let scope = WipeScope::new();
        assert_eq!(scope.tracked_count(), 0);
        assert!(scope.detach().is_none());
        scope.mark(SecretText::new("x"));
        assert_eq!(scope.tracked_count(), 1);
    }

    #[test]
    fn registration_is_by_identity() {
        let scope = WipeScope::new();
        let a = SecretText::new("same");
        let b = SecretText::new("same");
        assert_eq!(scope.mark(&a), 1);
        assert_eq!(scope.mark(a.clone()), 0);
        assert_eq!(scope.mark(&b), 1);
        assert_eq!(scope.tracked_count(), 2);
    }

    #[test]
    fn groups_are_flattened_and_none_skipped() {
        let scope = WipeScope::new();
        let item = WipeItem::Many(vec![
            SecretBytes::new(vec![1]).into(),
            WipeItem::None,
            WipeItem::Many(vec![
                SecretText::new("a").into(),
                Option::<SecretText>::None.into(),
            ]),
        ]);
        assert_eq!(scope.mark(item), 2);
    }

    #[test]
    fn replace_swaps_tracked_member() {
        let scope = WipeScope::new();
        let original = SecretText::new("secret");
        let copy = original.duplicate();
        scope.mark(&original);

        assert!(scope.replace(&original, &copy));
        assert!(!scope.is_tracked(&original));
        assert!(scope.is_tracked(&copy));
        assert!(!scope.replace(&original, &copy));
    }

    #[test]
    fn replace_ignores_untracked_original() {
        let scope = WipeScope::new();
        let a = SecretBytes::new(vec![1]);
        let b = SecretBytes::new(vec![2]);
        assert!(!scope.replace(&a, &b));
        assert!(!scope.is_tracked(&b));
    }

    #[test]
    fn mark_any_accepts_known_types() {
        let scope = WipeScope::new();
        let group: Vec<Box<dyn Any + Send + Sync>> = vec![
            Box::new(SecretText::new("a")),
            Box::new(vec![SecretBytes::new(vec![1]), SecretBytes::new(vec![2])]),
            Box::new(Option::<KeyMaterial>::None),
        ];
        assert_eq!(scope.mark_any(&group).unwrap(), 3);
    }

    #[test]
    fn mark_any_rejects_unknown_types() {
        let scope = WipeScope::new();
        let plain = String::from("not wipeable");
        let err = scope.mark_any(&plain).unwrap_err();
        assert!(err.to_string().contains("String"), "{err}");

        let group: Vec<Box<dyn Any + Send + Sync>> =
            vec![Box::new(SecretText::new("a")), Box::new(42u32)];
        assert!(scope.mark_any(&group).is_err());
        assert_eq!(scope.tracked_count(), 0);
    }

    #[test]
    fn dropping_unflushed_scope_destroys_members() {
        let bytes = SecretBytes::new(vec![5u8; 4]);
        {
            let scope = WipeScope::new();
            scope.mark(&bytes);
        }
        assert_eq!(bytes.to_vec(), vec![0u8; 4]);
    }

    #[test]
    fn clones_share_the_same_set() {
        let scope = WipeScope::new();
        let child = scope.clone();
        child.mark(SecretText::new("from child"));
        assert_eq!(scope.tracked_count(), 1);
        assert_eq!(scope.id(), child.id());
    }
}
