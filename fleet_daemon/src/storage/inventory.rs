use crate::managers::store::{HypervisorRecord, Store, StoreError, VmRecord};
use async_trait::async_trait;
use log::warn;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_yaml::Value;
use std::path::Path;
use tokio::sync::Mutex;
use utils::file_system::yaml_file::{YamlFile, YamlFileError};
use uuid::Uuid;

/// On disk layout. Rows stay untyped so a malformed row survives a rewrite.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Inventory {
    #[serde(default)]
    hypervisors: Vec<Value>,
    #[serde(default)]
    vms: Vec<Value>,
}

#[derive(Deserialize)]
struct RowId {
    id: Uuid,
}

fn row_id(row: &Value) -> Option<Uuid> {
    serde_yaml::from_value::<RowId>(row.clone())
        .ok()
        .map(|row| row.id)
}

fn decode_rows<T: DeserializeOwned>(rows: &[Value], kind: &str) -> Vec<T> {
    rows.iter()
        .enumerate()
        .filter_map(|(index, row)| match serde_yaml::from_value(row.clone()) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!("Skipping malformed {} row #{}: {}", kind, index, err);
                None
            }
        })
        .collect()
}

fn unavailable(err: YamlFileError) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

/// Declarative store kept in a single YAML document. The document is
/// re-read on every query so external edits are picked up.
pub struct YamlInventoryStore {
    file: Mutex<YamlFile<Inventory>>,
}

impl YamlInventoryStore {
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let file = YamlFile::open(path).await.map_err(unavailable)?;
        Ok(YamlInventoryStore {
            file: Mutex::new(file),
        })
    }
}

#[async_trait]
impl Store for YamlInventoryStore {
    async fn list_hypervisors(&self) -> Result<Vec<HypervisorRecord>, StoreError> {
        let mut file = self.file.lock().await;
        file.reload().await.map_err(unavailable)?;
        Ok(decode_rows(&file.get().hypervisors, "hypervisor"))
    }

    async fn list_vms(&self, hypervisor_id: &Uuid) -> Result<Vec<VmRecord>, StoreError> {
        let mut file = self.file.lock().await;
        file.reload().await.map_err(unavailable)?;
        Ok(decode_rows::<VmRecord>(&file.get().vms, "vm")
            .into_iter()
            .filter(|record| record.hypervisor_id == *hypervisor_id)
            .collect())
    }

    async fn insert_vm(&self, record: VmRecord) -> Result<(), StoreError> {
        let mut file = self.file.lock().await;
        file.reload().await.map_err(unavailable)?;
        if file.get().vms.iter().any(|row| row_id(row) == Some(record.id)) {
            return Err(StoreError::Duplicate(record.id));
        }
        let row = serde_yaml::to_value(&record).map_err(|err| StoreError::Write(err.to_string()))?;
        file.get_mut().vms.push(row);
        if let Err(err) = file.save().await {
            file.get_mut().vms.pop();
            return Err(StoreError::Write(err.to_string()));
        }
        Ok(())
    }

    async fn delete_vm(&self, vm_id: &Uuid) -> Result<(), StoreError> {
        let mut file = self.file.lock().await;
        file.reload().await.map_err(unavailable)?;
        let index = file
            .get()
            .vms
            .iter()
            .position(|row| row_id(row) == Some(*vm_id))
            .ok_or(StoreError::NotFound(*vm_id))?;
        let row = file.get_mut().vms.remove(index);
        if let Err(err) = file.save().await {
            file.get_mut().vms.insert(index, row);
            return Err(StoreError::Write(err.to_string()));
        }
        Ok(())
    }
}
