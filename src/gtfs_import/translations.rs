//! Overlay of `translations.txt` onto rows about to be inserted.
//!
//! Rows that cannot be tied to a translatable model field are skipped and
//! counted. Translations enrich a feed; they never fail an import.

use ahash::AHashMap;
use serde_json::Value;
use tracing::debug;

use super::field_mapping::{EntityKind, RecordKey, RecordKeyColumns, mapping_for_translation_table};
use super::tables::GtfsTable;
use crate::localized_text::{LocalizedText, set_locale_in_json};
use crate::models::{NewAgency, NewFare, NewRiderCategory, NewRoute, NewStop, NewStopTime, NewTrip};

/// Models with per-locale text fields.
pub trait Translatable {
    fn localized_field(&self, field: &str) -> Option<&Value>;

    fn localized_field_mut(&mut self, field: &str) -> Option<&mut Value>;

    /// Returns false when the model has no such localized field.
    fn set_localized_field(&mut self, locale: &str, field: &str, value: &str) -> bool {
        match self.localized_field_mut(field) {
            Some(current) => {
                set_locale_in_json(current, locale, value);
                true
            }
            None => false,
        }
    }
}

macro_rules! translatable_fields {
    ($model:ty, [$($field:ident),+]) => {
        impl Translatable for $model {
            fn localized_field(&self, field: &str) -> Option<&Value> {
                match field {
                    $(stringify!($field) => Some(&self.$field),)+
                    _ => None,
                }
            }

            fn localized_field_mut(&mut self, field: &str) -> Option<&mut Value> {
                match field {
                    $(stringify!($field) => Some(&mut self.$field),)+
                    _ => None,
                }
            }
        }
    };
}

translatable_fields!(NewAgency, [name, url, fare_url]);
translatable_fields!(NewRoute, [short_name, long_name, description, url]);
translatable_fields!(NewTrip, [headsign, short_name]);
translatable_fields!(NewStop, [name, description, tts_name]);
translatable_fields!(NewStopTime, [stop_headsign]);
translatable_fields!(NewFare, [name, description, instructions]);
translatable_fields!(NewRiderCategory, [name, description]);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationEntry {
    pub field: &'static str,
    pub language: String,
    pub translation: String,
}

#[derive(Debug, Default)]
pub struct TranslationIndex {
    by_record: AHashMap<(EntityKind, RecordKey), Vec<TranslationEntry>>,
    /// Entries keyed by the untranslated text instead of a record id.
    by_value: AHashMap<EntityKind, Vec<(String, TranslationEntry)>>,
    entries: usize,
    skipped: usize,
}

impl TranslationIndex {
    pub fn build(table: Option<&GtfsTable>) -> Self {
        let mut index = TranslationIndex::default();

        let Some(table) = table else {
            return index;
        };

        for row in table.rows() {
            let (Some(table_name), Some(field_name), Some(language), Some(translation)) = (
                row.get("table_name"),
                row.get("field_name"),
                row.get("language"),
                row.get("translation"),
            ) else {
                index.skip(row.index, "incomplete row");
                continue;
            };

            let Some(entity) = mapping_for_translation_table(table_name) else {
                index.skip(row.index, table_name);
                continue;
            };

            let Some(binding) = entity
                .binding_for_column(field_name)
                .filter(|binding| binding.translatable)
            else {
                index.skip(row.index, field_name);
                continue;
            };

            let entry = TranslationEntry {
                field: binding.field,
                language: language.to_string(),
                translation: translation.to_string(),
            };

            match (row.get("record_id"), row.get("field_value")) {
                (Some(record_id), _) => {
                    let record_sub_id = match entity.record_key {
                        RecordKeyColumns::Pair(..) => match row.get("record_sub_id") {
                            Some(sub_id) => Some(sub_id),
                            None => {
                                index.skip(row.index, "record_sub_id");
                                continue;
                            }
                        },
                        _ => None,
                    };

                    index
                        .by_record
                        .entry((entity.kind, RecordKey::new(record_id, record_sub_id)))
                        .or_default()
                        .push(entry);
                }
                (None, Some(field_value)) => {
                    index
                        .by_value
                        .entry(entity.kind)
                        .or_default()
                        .push((field_value.to_string(), entry));
                }
                (None, None) => {
                    index.skip(row.index, "no record_id or field_value");
                    continue;
                }
            }

            index.entries += 1;
        }

        index
    }

    fn skip(&mut self, row_index: usize, reason: &str) {
        debug!("Skipping translations.txt row {}: {}", row_index, reason);
        self.skipped += 1;
    }

    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Writes every matching translation into `row`. `default_lang` is the
    /// locale the untranslated values were stored under.
    pub fn apply<T: Translatable>(
        &self,
        kind: EntityKind,
        key: Option<&RecordKey>,
        row: &mut T,
        default_lang: &str,
    ) -> usize {
        let mut applied = 0;

        for (field_value, entry) in self.by_value.get(&kind).into_iter().flatten() {
            let matches = row
                .localized_field(entry.field)
                .map(LocalizedText::from_json)
                .is_some_and(|text| text.get_exact(default_lang) == Some(field_value.as_str()));

            if matches && row.set_localized_field(&entry.language, entry.field, &entry.translation) {
                applied += 1;
            }
        }

        // Record-specific translations win over value-based ones.
        if let Some(key) = key {
            for entry in self
                .by_record
                .get(&(kind, key.clone()))
                .into_iter()
                .flatten()
            {
                if row.set_localized_field(&entry.language, entry.field, &entry.translation) {
                    applied += 1;
                }
            }
        }

        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::localized_text::LocalizedText;
    use serde_json::json;
    use uuid::Uuid;

    fn stop(source_id: &str, name: &str) -> NewStop {
        NewStop {
            feed_id: 1,
            api_id: Uuid::nil(),
            source_id: source_id.to_string(),
            code: String::new(),
            name: LocalizedText::with_value("fi", name).to_json(),
            description: json!({}),
            tts_name: json!({}),
            point: None,
            wheelchair_boarding: None,
        }
    }

    fn index(csv: &str) -> TranslationIndex {
        let table = GtfsTable::from_reader("translations.txt", csv.as_bytes()).unwrap();
        TranslationIndex::build(Some(&table))
    }

    #[test]
    fn record_translations_set_locale_on_mapped_field() {
        let index = index(
            "table_name,field_name,language,translation,record_id\n\
             stops,stop_name,sv,Salutorget,kauppatori\n\
             stops,stop_name,en,Market Square,kauppatori\n",
        );
        let mut row = stop("kauppatori", "Kauppatori");

        let applied = index.apply(
            EntityKind::Stop,
            Some(&RecordKey::new("kauppatori", None)),
            &mut row,
            "fi",
        );

        assert_eq!(applied, 2);
        assert_eq!(
            row.name,
            json!({"fi": "Kauppatori", "sv": "Salutorget", "en": "Market Square"})
        );
    }

    #[test]
    fn unresolvable_rows_are_skipped() {
        let index = index(
            "table_name,field_name,language,translation,record_id\n\
             levels,level_name,sv,Nivå,1\n\
             stops,zone_id,sv,Zon,kauppatori\n\
             stops,stop_code,sv,K,kauppatori\n\
             feed_info,feed_publisher_name,sv,Färja,x\n\
             stops,stop_name,,Salutorget,kauppatori\n\
             stops,stop_name,sv,Salutorget,kauppatori\n",
        );

        assert_eq!(index.len(), 1);
        assert_eq!(index.skipped(), 5);
    }

    #[test]
    fn other_records_are_left_alone() {
        let index = index(
            "table_name,field_name,language,translation,record_id\n\
             stops,stop_name,sv,Salutorget,kauppatori\n",
        );
        let mut row = stop("suomenlinna", "Suomenlinna");

        let applied = index.apply(
            EntityKind::Stop,
            Some(&RecordKey::new("suomenlinna", None)),
            &mut row,
            "fi",
        );

        assert_eq!(applied, 0);
        assert_eq!(row.name, json!({"fi": "Suomenlinna"}));
    }

    #[test]
    fn field_value_translations_match_untranslated_text() {
        let index = index(
            "table_name,field_name,language,translation,record_id,field_value\n\
             stops,stop_name,sv,Sveaborg,,Suomenlinna\n",
        );
        let mut matching = stop("s1", "Suomenlinna");
        let mut other = stop("s2", "Kauppatori");

        index.apply(EntityKind::Stop, None, &mut matching, "fi");
        index.apply(EntityKind::Stop, None, &mut other, "fi");

        assert_eq!(matching.name, json!({"fi": "Suomenlinna", "sv": "Sveaborg"}));
        assert_eq!(other.name, json!({"fi": "Kauppatori"}));
    }

    #[test]
    fn stop_time_translations_need_the_sequence() {
        let index = index(
            "table_name,field_name,language,translation,record_id,record_sub_id\n\
             stop_times,stop_headsign,en,To the fortress,morning,2\n\
             stop_times,stop_headsign,en,Never applied,morning,\n",
        );
        let mut row = NewStopTime {
            feed_id: 1,
            trip_id: 1,
            stop_id: 1,
            arrival_time: None,
            departure_time: None,
            stop_sequence: 2,
            stop_headsign: json!({"fi": "Linnoitukseen"}),
            timepoint: 1,
        };

        let applied = index.apply(
            EntityKind::StopTime,
            Some(&RecordKey::new("morning", Some("02"))),
            &mut row,
            "fi",
        );

        assert_eq!(index.skipped(), 1);
        assert_eq!(applied, 1);
        assert_eq!(
            row.stop_headsign,
            json!({"fi": "Linnoitukseen", "en": "To the fortress"})
        );
    }

    #[test]
    fn unknown_field_is_rejected_by_the_model() {
        let mut row = stop("kauppatori", "Kauppatori");
        assert!(!row.set_localized_field("sv", "code", "K"));
        assert!(row.set_localized_field("sv", "tts_name", "Salutorget"));
    }
}
