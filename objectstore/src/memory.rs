use crate::{
    Backend, ObjectHandle, ObjectStoreError, ReadOpResult, ReadStep, Version, WriteStep,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default)]
struct ObjectState {
    version: Version,
    data: Vec<u8>,
    xattrs: BTreeMap<String, Vec<u8>>,
    omap: BTreeMap<String, Vec<u8>>,
}

/// Single-process, in-memory stand-in for a real cluster connection.
/// Used by unit/integration tests in this workspace and by a local,
/// single-process deployment of `storage-core` (spec §6 notes the wire
/// protocol to a real backend is out of scope for this core).
#[derive(Default)]
pub struct InMemoryBackend {
    objects: Mutex<HashMap<ObjectHandle, ObjectState>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_version(
    existing: Option<&ObjectState>,
    expected: Version,
) -> Result<(), ObjectStoreError> {
    let found = existing.map(|o| o.version).unwrap_or(0);
    if found < expected {
        Err(ObjectStoreError::VersionTooOld { expected, found })
    } else if found > expected {
        Err(ObjectStoreError::VersionTooNew { expected, found })
    } else {
        Ok(())
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn apply_write(
        &self,
        oid: &ObjectHandle,
        steps: &[WriteStep],
    ) -> Result<Version, ObjectStoreError> {
        let mut objects = self.objects.lock().await;

        // Validate every precondition against a working copy before
        // mutating anything, so a failing step never leaves partial
        // visibility (spec §4.A: "either all succeed or the whole op
        // fails without partial visibility").
        let mut working = objects.get(oid).cloned();

        for step in steps {
            match step {
                WriteStep::AssertVersion(expected) => {
                    check_version(working.as_ref(), *expected)?;
                }
                WriteStep::Remove => {
                    working = None;
                }
                WriteStep::Create { exclusive } => {
                    if working.is_some() && *exclusive {
                        return Err(ObjectStoreError::AlreadyExists(oid.to_string()));
                    }
                    working.get_or_insert_with(ObjectState::default);
                }
                WriteStep::SetXattr { name, value } => {
                    let state = working
                        .as_mut()
                        .ok_or_else(|| ObjectStoreError::NotFound(oid.to_string()))?;
                    state.xattrs.insert(name.clone(), value.clone());
                }
                WriteStep::WriteFull(data) => {
                    let state = working.get_or_insert_with(ObjectState::default);
                    state.data = data.clone();
                }
                WriteStep::RmOmapKeys(keys) => {
                    let state = working
                        .as_mut()
                        .ok_or_else(|| ObjectStoreError::NotFound(oid.to_string()))?;
                    for key in keys {
                        state.omap.remove(key);
                    }
                }
                WriteStep::SetOmap(kvs) => {
                    let state = working.get_or_insert_with(ObjectState::default);
                    state.omap.extend(kvs.clone());
                }
            }
        }

        let new_version = match working {
            Some(mut state) => {
                state.version = state.version.saturating_add(1);
                let version = state.version;
                objects.insert(oid.clone(), state);
                version
            }
            None => {
                objects.remove(oid);
                0
            }
        };

        Ok(new_version)
    }

    async fn apply_read(
        &self,
        oid: &ObjectHandle,
        steps: &[ReadStep],
    ) -> Result<ReadOpResult, ObjectStoreError> {
        let objects = self.objects.lock().await;
        let state = objects.get(oid);

        let mut result = ReadOpResult::default();
        for step in steps {
            match step {
                ReadStep::AssertVersion(expected) => {
                    check_version(state, *expected)?;
                }
                ReadStep::Read { offset, len } => {
                    let state = state.ok_or_else(|| ObjectStoreError::NotFound(oid.to_string()))?;
                    let offset = *offset as usize;
                    let len = *len as usize;
                    if offset > state.data.len() {
                        return Err(ObjectStoreError::ReadIncomplete {
                            expected: len,
                            actual: 0,
                        });
                    }
                    let end = (offset + len).min(state.data.len());
                    let slice = state.data[offset..end].to_vec();
                    if slice.len() < len {
                        return Err(ObjectStoreError::ReadIncomplete {
                            expected: len,
                            actual: slice.len(),
                        });
                    }
                    result.data = Some(slice);
                }
                ReadStep::GetOmapValuesByKeys(keys) => {
                    let state = state.ok_or_else(|| ObjectStoreError::NotFound(oid.to_string()))?;
                    let mut omap = BTreeMap::new();
                    for key in keys {
                        if let Some(value) = state.omap.get(key) {
                            omap.insert(key.clone(), value.clone());
                        }
                    }
                    result.omap = Some(omap);
                }
                ReadStep::ListOmap => {
                    let state = state.ok_or_else(|| ObjectStoreError::NotFound(oid.to_string()))?;
                    result.omap = Some(state.omap.clone());
                }
            }
        }

        Ok(result)
    }

    async fn stat(&self, oid: &ObjectHandle) -> Result<Version, ObjectStoreError> {
        let objects = self.objects.lock().await;
        objects
            .get(oid)
            .map(|s| s.version)
            .ok_or_else(|| ObjectStoreError::NotFound(oid.to_string()))
    }

    async fn get_xattr(&self, oid: &ObjectHandle, name: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let objects = self.objects.lock().await;
        let state = objects
            .get(oid)
            .ok_or_else(|| ObjectStoreError::NotFound(oid.to_string()))?;
        state
            .xattrs
            .get(name)
            .cloned()
            .ok_or_else(|| ObjectStoreError::NoData(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ObjectStoreContext;
    use std::sync::Arc;

    fn ctx() -> ObjectStoreContext {
        ObjectStoreContext::new(Arc::new(InMemoryBackend::new()))
    }

    #[tokio::test]
    async fn create_then_write_then_read_round_trips() {
        let ctx = ctx();
        let oid = ObjectHandle::new("pool", "obj-1");

        ctx.create_write_op()
            .create(true)
            .write_full(b"hello".to_vec())
            .operate(&ctx, &oid)
            .await
            .unwrap();
        assert_eq!(ctx.get_last_version(), 1);

        let result = ctx
            .create_read_op()
            .read(0, 5)
            .operate(&ctx, &oid)
            .await
            .unwrap();
        assert_eq!(result.data.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn exclusive_create_on_existing_object_fails() {
        let ctx = ctx();
        let oid = ObjectHandle::new("pool", "obj-1");
        ctx.create_write_op()
            .create(true)
            .operate(&ctx, &oid)
            .await
            .unwrap();

        let err = ctx
            .create_write_op()
            .create(true)
            .operate(&ctx, &oid)
            .await
            .unwrap_err();
        assert!(matches!(err, ObjectStoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn assert_version_rejects_stale_writer() {
        let ctx = ctx();
        let oid = ObjectHandle::new("pool", "obj-1");
        ctx.create_write_op()
            .create(true)
            .operate(&ctx, &oid)
            .await
            .unwrap();
        let stale_version = 0;

        let err = ctx
            .create_write_op()
            .assert_version(stale_version)
            .set_xattr("k", b"v".to_vec())
            .operate(&ctx, &oid)
            .await
            .unwrap_err();
        assert!(matches!(err, ObjectStoreError::VersionTooNew { .. }));
    }

    #[tokio::test]
    async fn remove_within_write_op_deletes_object() {
        let ctx = ctx();
        let oid = ObjectHandle::new("pool", "obj-1");
        ctx.create_write_op()
            .create(true)
            .operate(&ctx, &oid)
            .await
            .unwrap();

        ctx.create_write_op()
            .remove()
            .operate(&ctx, &oid)
            .await
            .unwrap();

        let err = ctx.stat(&oid).await.unwrap_err();
        assert!(matches!(err, ObjectStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn omap_round_trip_and_removal() {
        let ctx = ctx();
        let oid = ObjectHandle::new("pool", "obj-1");
        let mut kvs = BTreeMap::new();
        kvs.insert("a".to_string(), vec![1]);
        kvs.insert("b".to_string(), vec![2]);

        ctx.create_write_op()
            .create(true)
            .set_omap(kvs)
            .operate(&ctx, &oid)
            .await
            .unwrap();

        let result = ctx
            .create_read_op()
            .get_omap_values_by_keys(vec!["a".to_string(), "missing".to_string()])
            .operate(&ctx, &oid)
            .await
            .unwrap();
        let entries: Vec<_> = result.omap_iter().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "a");

        ctx.create_write_op()
            .rm_omap_keys(vec!["a".to_string()])
            .operate(&ctx, &oid)
            .await
            .unwrap();
        let result = ctx
            .create_read_op()
            .get_omap_values_by_keys(vec!["a".to_string()])
            .operate(&ctx, &oid)
            .await
            .unwrap();
        assert_eq!(result.omap_iter().count(), 0);
    }
}
