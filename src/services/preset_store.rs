// src/services/preset_store.rs
use crate::errors::ThumbsmithError;
use crate::models::*;
use async_trait::async_trait;
use log::{info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Fixed key holding the whole preset collection as one JSON array.
pub const PRESETS_KEY: &str = "thumbsmith_presets";

/// Durable string storage the preset collection is written to.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, ThumbsmithError>;
    async fn set(&self, key: &str, value: String) -> Result<(), ThumbsmithError>;
}

/// Process-local store, used when no Redis URL is configured and in tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: StdMutex<HashMap<String, String>>,
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ThumbsmithError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| ThumbsmithError::Storage(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), ThumbsmithError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| ThumbsmithError::Storage(e.to_string()))?;
        entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// Overwrites `current` with every field present in `loaded`.
pub fn merge(current: CompositionModel, loaded: PartialCompositionModel) -> CompositionModel {
    let mut merged = current;

    macro_rules! overwrite {
        ($($field:ident),+ $(,)?) => {
            $(
                if let Some(value) = loaded.$field {
                    merged.$field = value;
                }
            )+
        };
    }

    overwrite!(
        add_text,
        ai_optimize_text,
        text_mode,
        custom_text,
        text_language,
        font_style,
        text_effect,
        text_position,
        text_color,
        background_mode,
        ai_optimize_background,
        shot_type,
        ai_optimize_framing,
        high_saturation,
        expression,
        lighting,
        ai_optimize_lighting,
        face_visibility,
        character_position,
        custom_instructions,
        ai_auto_settings,
    );

    if loaded.character_image.is_some() {
        merged.character_image = loaded.character_image;
    }
    if loaded.character_description.is_some() {
        merged.character_description = loaded.character_description;
    }

    merged
}

/// Applies a stored preset on top of the current form state.
pub fn apply_preset(current: PresetSnapshot, fields: PresetFields) -> PresetSnapshot {
    let mut snapshot = current;

    if let Some(topic) = fields.topic {
        snapshot.topic = topic;
    }
    if let Some(category) = fields.active_category {
        snapshot.active_category = category;
    }
    if let Some(style) = fields.style {
        snapshot.style = style;
    }
    if let Some(game_name) = fields.game_name {
        snapshot.game_name = game_name;
    }
    // An absent reference URL clears the field.
    snapshot.reference_url = fields.reference_url;
    if let Some(aspect_ratio) = fields.aspect_ratio {
        snapshot.aspect_ratio = aspect_ratio;
    }
    if let Some(resolution) = fields.resolution {
        snapshot.resolution = resolution;
    }
    if let Some(negative_prompt) = fields.negative_prompt {
        snapshot.negative_prompt = negative_prompt;
    }
    if let Some(elements) = fields.elements {
        snapshot.elements = merge(snapshot.elements, elements);
    }

    snapshot
}

/// What was read from the key-value store.
#[derive(Default)]
struct Collection {
    presets: Vec<Preset>,
    /// Entries this build cannot decode, written back untouched.
    unreadable: Vec<Value>,
    /// The stored value is not a JSON array; writes would destroy it.
    corrupt: bool,
}

impl Collection {
    fn decode(raw: &str) -> Self {
        let entries = match serde_json::from_str::<Vec<Value>>(raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Preset collection is unreadable, saving is disabled: {}", e);
                return Self {
                    corrupt: true,
                    ..Self::default()
                };
            }
        };

        let mut collection = Self::default();
        for entry in entries {
            match serde_json::from_value::<Preset>(entry.clone()) {
                Ok(preset) => collection.presets.push(preset),
                Err(e) => {
                    warn!(
                        "Skipping unreadable preset {}: {}",
                        entry.get("id").unwrap_or(&Value::Null),
                        e
                    );
                    collection.unreadable.push(entry);
                }
            }
        }
        collection
    }
}

/// Named presets, kept in insertion order and rewritten in full on every change.
pub struct PresetStore {
    store: Arc<dyn KeyValueStore>,
    collection: Mutex<Collection>,
}

impl PresetStore {
    /// Reads the collection once. Entries that fail to decode are skipped but kept.
    pub async fn open(store: Arc<dyn KeyValueStore>) -> Result<Self, ThumbsmithError> {
        let collection = match store.get(PRESETS_KEY).await? {
            Some(raw) => Collection::decode(&raw),
            None => Collection::default(),
        };
        info!(
            "Loaded {} presets ({} unreadable)",
            collection.presets.len(),
            collection.unreadable.len()
        );

        Ok(Self {
            store,
            collection: Mutex::new(collection),
        })
    }

    async fn persist(
        &self,
        collection: &Collection,
        presets: &[Preset],
    ) -> Result<(), ThumbsmithError> {
        if collection.corrupt {
            return Err(ThumbsmithError::Storage(format!(
                "refusing to overwrite unreadable value under {}",
                PRESETS_KEY
            )));
        }

        let mut entries = presets
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        entries.extend(collection.unreadable.iter().cloned());

        let value = serde_json::to_string(&entries)?;
        self.store.set(PRESETS_KEY, value).await
    }

    pub async fn save(
        &self,
        name: &str,
        snapshot: PresetSnapshot,
    ) -> Result<String, ThumbsmithError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ThumbsmithError::Validation(
                "Preset name is required".to_string(),
            ));
        }

        let mut collection = self.collection.lock().await;
        if collection
            .presets
            .iter()
            .any(|p| p.name.trim().eq_ignore_ascii_case(name))
        {
            return Err(ThumbsmithError::Validation(format!(
                "A preset named \"{}\" already exists",
                name
            )));
        }

        let preset = Preset {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: Some(chrono::Utc::now()),
            fields: snapshot.into(),
        };
        let id = preset.id.clone();

        let mut updated = collection.presets.clone();
        updated.push(preset);
        self.persist(&collection, &updated).await?;
        collection.presets = updated;

        info!("Saved preset {} ({})", name, id);
        Ok(id)
    }

    pub async fn list(&self) -> Vec<Preset> {
        self.collection.lock().await.presets.clone()
    }

    pub async fn get(&self, id: &str) -> Result<Preset, ThumbsmithError> {
        self.collection
            .lock()
            .await
            .presets
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| ThumbsmithError::NotFound(format!("preset {}", id)))
    }

    /// Merges the preset into `current`; fields the preset lacks keep their value.
    pub async fn load(
        &self,
        id: &str,
        current: PresetSnapshot,
    ) -> Result<PresetSnapshot, ThumbsmithError> {
        let preset = self.get(id).await?;
        Ok(apply_preset(current, preset.fields))
    }

    pub async fn delete(&self, id: &str) -> Result<(), ThumbsmithError> {
        let mut collection = self.collection.lock().await;
        if !collection.presets.iter().any(|p| p.id == id) {
            return Err(ThumbsmithError::NotFound(format!("preset {}", id)));
        }

        let updated: Vec<Preset> = collection
            .presets
            .iter()
            .filter(|p| p.id != id)
            .cloned()
            .collect();
        self.persist(&collection, &updated).await?;
        collection.presets = updated;

        info!("Deleted preset {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rejects writes so failure paths can be checked.
    struct ReadOnlyStore;

    #[async_trait]
    impl KeyValueStore for ReadOnlyStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, ThumbsmithError> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: String) -> Result<(), ThumbsmithError> {
            Err(ThumbsmithError::Storage("read only".to_string()))
        }
    }

    fn snapshot() -> PresetSnapshot {
        PresetSnapshot {
            topic: "cooking pasta".to_string(),
            active_category: "Lifestyle".to_string(),
            style: "Cozy / Aesthetic".to_string(),
            game_name: String::new(),
            reference_url: Some("https://example.com/ref".to_string()),
            aspect_ratio: AspectRatio::Portrait9x16,
            resolution: ImageResolution::FourK,
            negative_prompt: "blurry".to_string(),
            elements: CompositionModel {
                add_text: true,
                ai_optimize_text: false,
                text_mode: TextMode::Custom,
                custom_text: "AL DENTE".to_string(),
                text_language: TextLanguage::Persian,
                text_color: TextColor::Gold,
                face_visibility: FaceVisibility::Faceless,
                high_saturation: true,
                character_description: Some("chef with a mustache".to_string()),
                ..CompositionModel::default()
            },
        }
    }

    async fn memory_store() -> (Arc<MemoryStore>, PresetStore) {
        let kv = Arc::new(MemoryStore::default());
        let store = PresetStore::open(kv.clone()).await.unwrap();
        (kv, store)
    }

    #[tokio::test]
    async fn save_then_load_restores_the_snapshot() {
        let (_, store) = memory_store().await;
        let saved = snapshot();

        let id = store.save("X", saved.clone()).await.unwrap();
        let loaded = store.load(&id, PresetSnapshot::default()).await.unwrap();

        assert_eq!(loaded, saved);
    }

    #[tokio::test]
    async fn presets_survive_a_reopen() {
        let (kv, store) = memory_store().await;
        let id = store.save("Weekly vlog", snapshot()).await.unwrap();
        drop(store);

        let reopened = PresetStore::open(kv).await.unwrap();
        let presets = reopened.list().await;

        assert_eq!(presets.len(), 1);
        assert_eq!(presets[0].id, id);
        assert_eq!(presets[0].name, "Weekly vlog");
    }

    #[tokio::test]
    async fn collection_is_one_json_array_under_fixed_key() {
        let (kv, store) = memory_store().await;
        store.save("A", snapshot()).await.unwrap();
        store.save("B", snapshot()).await.unwrap();

        let raw = kv.get(PRESETS_KEY).await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();

        let array = value.as_array().unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array[0]["name"], "A");
        assert_eq!(array[0]["topic"], "cooking pasta");
        assert_eq!(array[0]["elements"]["textColor"], "Gold");
        assert_eq!(array[0]["aspectRatio"], "9:16");
    }

    #[tokio::test]
    async fn list_keeps_insertion_order_and_delete_removes() {
        let (_, store) = memory_store().await;
        let first = store.save("First", snapshot()).await.unwrap();
        let second = store.save("Second", snapshot()).await.unwrap();
        let third = store.save("Third", snapshot()).await.unwrap();

        store.delete(&second).await.unwrap();

        let ids: Vec<String> = store.list().await.into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![first, third]);
        assert!(matches!(
            store.delete(&second).await,
            Err(ThumbsmithError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn names_must_be_present_and_unique() {
        let (_, store) = memory_store().await;
        store.save("Gaming", snapshot()).await.unwrap();

        assert!(matches!(
            store.save("  ", snapshot()).await,
            Err(ThumbsmithError::Validation(_))
        ));
        assert!(matches!(
            store.save(" gaming ", snapshot()).await,
            Err(ThumbsmithError::Validation(_))
        ));
        assert_eq!(store.list().await.len(), 1);
    }

    #[tokio::test]
    async fn failed_write_leaves_the_collection_unchanged() {
        let store = PresetStore::open(Arc::new(ReadOnlyStore)).await.unwrap();

        assert!(matches!(
            store.save("A", snapshot()).await,
            Err(ThumbsmithError::Storage(_))
        ));
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn older_presets_merge_into_current_state() {
        let kv = Arc::new(MemoryStore::default());
        let legacy = r#"[{
            "id": "1718000000000",
            "name": "Old",
            "topic": "speedrun",
            "style": "Retro Gaming",
            "retiredField": 7,
            "elements": { "addText": true, "textColor": "Red", "mysteryToggle": true }
        }]"#;
        kv.set(PRESETS_KEY, legacy.to_string()).await.unwrap();
        let store = PresetStore::open(kv).await.unwrap();

        let mut current = snapshot();
        current.elements.shot_type = ShotType::Overhead;
        let loaded = store.load("1718000000000", current.clone()).await.unwrap();

        assert_eq!(loaded.topic, "speedrun");
        assert_eq!(loaded.style, "Retro Gaming");
        assert_eq!(loaded.negative_prompt, current.negative_prompt);
        assert_eq!(loaded.aspect_ratio, current.aspect_ratio);
        assert!(loaded.elements.add_text);
        assert_eq!(loaded.elements.text_color, TextColor::Red);
        assert_eq!(loaded.elements.shot_type, ShotType::Overhead);
        assert_eq!(loaded.elements.custom_text, current.elements.custom_text);
        assert_eq!(loaded.reference_url, None);
    }

    #[tokio::test]
    async fn unreadable_collection_is_never_overwritten() {
        let kv = Arc::new(MemoryStore::default());
        kv.set(PRESETS_KEY, "{not json".to_string()).await.unwrap();

        let store = PresetStore::open(kv.clone()).await.unwrap();
        assert!(store.list().await.is_empty());
        assert!(matches!(
            store.save("New", snapshot()).await,
            Err(ThumbsmithError::Storage(_))
        ));
        assert_eq!(kv.get(PRESETS_KEY).await.unwrap().unwrap(), "{not json");
    }

    #[tokio::test]
    async fn one_bad_entry_does_not_cost_the_others() {
        let kv = Arc::new(MemoryStore::default());
        let stored = r#"[
            { "id": "a", "name": "Good A", "topic": "speedrun" },
            { "id": "b", "name": "Good B", "elements": { "textColor": "Gold" } },
            { "id": "c", "name": "Legacy", "elements": { "textColor": "Orange" } }
        ]"#;
        kv.set(PRESETS_KEY, stored.to_string()).await.unwrap();

        let store = PresetStore::open(kv.clone()).await.unwrap();
        let names: Vec<String> = store.list().await.into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Good A", "Good B"]);

        store.save("New", snapshot()).await.unwrap();
        store.delete("a").await.unwrap();

        let raw = kv.get(PRESETS_KEY).await.unwrap().unwrap();
        let entries: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
        let ids: Vec<&str> = entries.iter().map(|e| e["id"].as_str().unwrap()).collect();
        assert_eq!(entries.len(), 3);
        assert!(ids.contains(&"b"));
        assert!(ids.contains(&"c"));
        let legacy = entries.iter().find(|e| e["id"] == "c").unwrap();
        assert_eq!(legacy["elements"]["textColor"], "Orange");
    }

    #[test]
    fn merge_only_touches_present_fields() {
        let current = CompositionModel {
            lighting: Lighting::Neon,
            custom_instructions: "keep me".to_string(),
            ..CompositionModel::default()
        };
        let loaded = PartialCompositionModel {
            lighting: Some(Lighting::GoldenHour),
            character_description: Some("bald man".to_string()),
            ..PartialCompositionModel::default()
        };

        let merged = merge(current, loaded);

        assert_eq!(merged.lighting, Lighting::GoldenHour);
        assert_eq!(merged.custom_instructions, "keep me");
        assert_eq!(merged.character_description.as_deref(), Some("bald man"));
    }

    #[test]
    fn full_partial_reproduces_the_model() {
        let model = snapshot().elements;
        assert_eq!(merge(CompositionModel::default(), model.clone().into()), model);
    }
}
