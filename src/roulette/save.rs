//! Job Roulette セーブ/ロード、エクスポート/インポート。
//!
//! ## 保存先 (localStorage)
//!
//! - `dq7r-job-history`: 履歴 (HistoryEntry の配列、新しい順、最大50件)。
//!   マスター状況は履歴から都度集計するので別途保存しない。
//! - `dq7r-mastered-jobs`: 旧形式のマスター状況。起動時に削除する。
//! - `dq7r-job-prefs`: フェーズ・除外設定・タイミングラベル。
//! - `dq7r-job-export` / `dq7r-job-import`: エクスポート出力とインポート入力。
//!
//! ## バージョニング方針 (設定)
//!
//! - `PREFS_VERSION`: 現在の設定形式バージョン。フィールド追加時にインクリメントする。
//! - `MIN_COMPATIBLE_VERSION`: これ未満の設定は破棄してデフォルトに戻す。
//!
//! 履歴はエクスポート形式と互換に保つため素の配列で保存し、
//! 旧形式 (職業名のみ) の読み替えは `JobRecord` のデシリアライズ側で行う。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::state::{HistoryEntry, Session};
#[cfg(any(target_arch = "wasm32", test))]
use super::state::{DrawOptions, Phase, MAX_HISTORY};

/// エクスポート文書のフォーマットバージョン。
pub const EXPORT_VERSION: u32 = 1;

#[cfg(any(target_arch = "wasm32", test))]
const PREFS_VERSION: u32 = 1;

#[cfg(any(target_arch = "wasm32", test))]
const MIN_COMPATIBLE_VERSION: u32 = 1;

#[cfg(target_arch = "wasm32")]
const HISTORY_KEY: &str = "dq7r-job-history";

#[cfg(target_arch = "wasm32")]
const LEGACY_MASTERED_KEY: &str = "dq7r-mastered-jobs";

#[cfg(target_arch = "wasm32")]
const PREFS_KEY: &str = "dq7r-job-prefs";

/// エクスポート文書の書き出し先。
pub const EXPORT_KEY: &str = "dq7r-job-export";

/// インポート文書の読み込み元。
pub const IMPORT_KEY: &str = "dq7r-job-import";

// ── 設定 ─────────────────────────────────────────────────────

#[cfg(any(target_arch = "wasm32", test))]
#[derive(Serialize, Deserialize)]
struct PrefsData {
    version: u32,
    prefs: Prefs,
}

#[cfg(any(target_arch = "wasm32", test))]
#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct Prefs {
    phase: u8,
    exclude_prev: bool,
    exclude_mastered: bool,
    timing: String,
}

#[cfg(any(target_arch = "wasm32", test))]
impl Default for Prefs {
    fn default() -> Self {
        Self {
            phase: 1,
            exclude_prev: false,
            exclude_mastered: false,
            timing: String::new(),
        }
    }
}

#[cfg(any(target_arch = "wasm32", test))]
fn extract_prefs(session: &Session) -> PrefsData {
    PrefsData {
        version: PREFS_VERSION,
        prefs: Prefs {
            phase: session.phase.number(),
            exclude_prev: session.options.exclude_prev,
            exclude_mastered: session.options.exclude_mastered,
            timing: session.timing.clone(),
        },
    }
}

/// 設定を Session に反映する。範囲外のフェーズは無視して現在値を保つ。
#[cfg(any(target_arch = "wasm32", test))]
fn apply_prefs(session: &mut Session, prefs: &Prefs) {
    if let Some(phase) = Phase::from_number(prefs.phase) {
        session.phase = phase;
    }
    session.options = DrawOptions {
        exclude_prev: prefs.exclude_prev,
        exclude_mastered: prefs.exclude_mastered,
    };
    session.timing = prefs.timing.clone();
}

/// 設定 JSON を読む。壊れている、または古すぎる場合は None。
#[cfg(any(target_arch = "wasm32", test))]
fn prefs_from_json(json: &str) -> Option<Prefs> {
    let data: PrefsData = serde_json::from_str(json).ok()?;
    if data.version < MIN_COMPATIBLE_VERSION {
        return None;
    }
    Some(data.prefs)
}

/// 保存済み履歴 JSON を読む。新しい順に並べ直し、上限で切り詰める。
///
/// 壊れたレコードはそのレコードだけ捨て、捨てた件数を一緒に返す。
/// 配列として読めない場合だけ `Err`。
#[cfg(any(target_arch = "wasm32", test))]
fn history_from_json(json: &str) -> Result<(Vec<HistoryEntry>, usize), ImportError> {
    let Value::Array(records) = serde_json::from_str::<Value>(json)? else {
        return Err(ImportError::UnrecognizedShape);
    };
    let total = records.len();
    let mut history = valid_entries(records);
    let dropped = total - history.len();
    history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    history.truncate(MAX_HISTORY);
    Ok((history, dropped))
}

// ── エクスポート ─────────────────────────────────────────────

/// エクスポート文書。キー名はブラウザ版の JSON と揃えてある。
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: u32,
    pub exported_at: i64,
    pub current_phase: u8,
    pub history: Vec<HistoryEntry>,
}

/// 現在の履歴を整形済み JSON にする。
pub fn export_json(session: &Session, now_ms: i64) -> Result<String, serde_json::Error> {
    let doc = ExportDocument {
        version: EXPORT_VERSION,
        exported_at: now_ms,
        current_phase: session.phase.number(),
        history: session.history.clone(),
    };
    serde_json::to_string_pretty(&doc)
}

// ── インポート ───────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("JSON として読み込めません: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("履歴の配列もエクスポート形式も見つかりません")]
    UnrecognizedShape,
    #[error("有効な履歴データがありません")]
    NoValidEntries,
}

/// 履歴の配列、またはエクスポート文書を受け付ける。
///
/// 数値の `timestamp`・数値の `phase`・配列の `assignments` を持たない
/// レコードは黙って捨てる。1件も残らなければ `NoValidEntries`。
/// 文書の `currentPhase` は読まない。
pub fn parse_import(text: &str) -> Result<Vec<HistoryEntry>, ImportError> {
    let value: Value = serde_json::from_str(text)?;
    let records = match value {
        Value::Array(items) => items,
        Value::Object(mut doc) => match doc.remove("history") {
            Some(Value::Array(items)) => items,
            _ => return Err(ImportError::UnrecognizedShape),
        },
        _ => return Err(ImportError::UnrecognizedShape),
    };

    let entries = valid_entries(records);
    if entries.is_empty() {
        return Err(ImportError::NoValidEntries);
    }
    Ok(entries)
}

/// 読めるレコードだけを `HistoryEntry` にする。順序は保つ。
fn valid_entries(records: Vec<Value>) -> Vec<HistoryEntry> {
    records
        .into_iter()
        .filter(is_valid_record)
        .filter_map(|r| serde_json::from_value(r).ok())
        .collect()
}

fn is_valid_record(record: &Value) -> bool {
    record.get("timestamp").is_some_and(Value::is_number)
        && record.get("phase").is_some_and(Value::is_number)
        && record.get("assignments").is_some_and(Value::is_array)
}

// ── localStorage ─────────────────────────────────────────────

/// localStorage にアクセスする。WASM 環境でのみ動作。
#[cfg(target_arch = "wasm32")]
fn get_storage() -> Option<web_sys::Storage> {
    web_sys::window()?.local_storage().ok()?
}

#[cfg(target_arch = "wasm32")]
fn write_item(key: &str, value: &str) {
    if let Some(storage) = get_storage() {
        if let Err(e) = storage.set_item(key, value) {
            web_sys::console::warn_1(
                &format!("Job Roulette: localStorage への保存に失敗 ({key}): {e:?}").into(),
            );
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn read_item(key: &str) -> Option<String> {
    get_storage()?.get_item(key).ok()?
}

/// 旧形式のマスター状況を削除する。現在は履歴から集計している。
#[cfg(target_arch = "wasm32")]
pub fn remove_legacy_data() {
    if let Some(storage) = get_storage() {
        let _ = storage.remove_item(LEGACY_MASTERED_KEY);
    }
}

/// 履歴を保存する。失敗時はコンソールに警告して続行。
#[cfg(target_arch = "wasm32")]
pub fn save_history(session: &Session) {
    match serde_json::to_string(&session.history) {
        Ok(json) => write_item(HISTORY_KEY, &json),
        Err(e) => web_sys::console::warn_1(
            &format!("Job Roulette: 履歴のシリアライズに失敗: {e}").into(),
        ),
    }
}

/// 履歴を復元する。壊れたレコードは読み飛ばし、配列として読めない
/// データだけを破棄して空の履歴から始める。
#[cfg(target_arch = "wasm32")]
pub fn load_history(session: &mut Session) -> bool {
    let Some(json) = read_item(HISTORY_KEY) else {
        return false;
    };
    match history_from_json(&json) {
        Ok((history, dropped)) => {
            if dropped > 0 {
                web_sys::console::warn_1(
                    &format!("Job Roulette: 読めない履歴 {dropped} 件を読み飛ばしました").into(),
                );
            }
            session.history = history;
            true
        }
        Err(e) => {
            web_sys::console::warn_1(
                &format!("Job Roulette: 履歴のパースに失敗（破棄します）: {e}").into(),
            );
            if let Some(storage) = get_storage() {
                let _ = storage.remove_item(HISTORY_KEY);
            }
            false
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub fn save_prefs(session: &Session) {
    match serde_json::to_string(&extract_prefs(session)) {
        Ok(json) => write_item(PREFS_KEY, &json),
        Err(e) => web_sys::console::warn_1(
            &format!("Job Roulette: 設定のシリアライズに失敗: {e}").into(),
        ),
    }
}

#[cfg(target_arch = "wasm32")]
pub fn load_prefs(session: &mut Session) -> bool {
    let Some(json) = read_item(PREFS_KEY) else {
        return false;
    };
    match prefs_from_json(&json) {
        Some(prefs) => {
            apply_prefs(session, &prefs);
            true
        }
        None => {
            web_sys::console::log_1(
                &"Job Roulette: 設定が読めないか古すぎるため、初期設定を使います。".into(),
            );
            if let Some(storage) = get_storage() {
                let _ = storage.remove_item(PREFS_KEY);
            }
            false
        }
    }
}

/// 履歴と設定をまとめて保存する。
#[cfg(target_arch = "wasm32")]
pub fn save_all(session: &Session) {
    save_history(session);
    save_prefs(session);
}

/// エクスポート文書を書き出し、コンソールにも出力する。
#[cfg(target_arch = "wasm32")]
pub fn write_export(json: &str) -> bool {
    write_item(EXPORT_KEY, json);
    web_sys::console::log_1(&json.into());
    true
}

#[cfg(not(target_arch = "wasm32"))]
pub fn write_export(_json: &str) -> bool {
    false
}

/// インポート文書を読み込む。
#[cfg(target_arch = "wasm32")]
pub fn read_import_text() -> Option<String> {
    read_item(IMPORT_KEY).filter(|t| !t.trim().is_empty())
}

#[cfg(not(target_arch = "wasm32"))]
pub fn read_import_text() -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roulette::state::{Assignment, JobCategory, JobRecord};

    fn sample_entry(timestamp: i64) -> HistoryEntry {
        HistoryEntry {
            timestamp,
            phase: 2,
            phase_label: Some("アイラ加入".into()),
            timing: "ユバール".into(),
            assignments: vec![Assignment {
                character: "アイラ".into(),
                jobs: vec![
                    JobRecord {
                        name: "踊り子".into(),
                        category: JobCategory::Basic,
                        mastered: true,
                    },
                    JobRecord::new("盗賊", JobCategory::Basic),
                ],
            }],
        }
    }

    // ── 設定 ──────────────────────────────────────────────

    #[test]
    fn prefs_roundtrip() {
        let mut original = Session::new();
        original.phase = Phase::Three;
        original.options.exclude_prev = true;
        original.timing = "神の兵士".into();

        let json = serde_json::to_string(&extract_prefs(&original)).unwrap();
        let prefs = prefs_from_json(&json).unwrap();

        let mut restored = Session::new();
        apply_prefs(&mut restored, &prefs);
        assert_eq!(restored.phase, Phase::Three);
        assert!(restored.options.exclude_prev);
        assert!(!restored.options.exclude_mastered);
        assert_eq!(restored.timing, "神の兵士");
    }

    #[test]
    fn prefs_missing_fields_use_defaults() {
        let prefs = prefs_from_json(r#"{"version":1,"prefs":{"exclude_mastered":true}}"#).unwrap();
        assert_eq!(
            prefs,
            Prefs {
                exclude_mastered: true,
                ..Prefs::default()
            }
        );
    }

    #[test]
    fn prefs_too_old_or_broken_are_rejected() {
        assert!(prefs_from_json(r#"{"version":0,"prefs":{}}"#).is_none());
        assert!(prefs_from_json("not json").is_none());
    }

    #[test]
    fn out_of_range_phase_is_ignored() {
        let mut s = Session::new();
        s.phase = Phase::Two;
        apply_prefs(
            &mut s,
            &Prefs {
                phase: 9,
                ..Prefs::default()
            },
        );
        assert_eq!(s.phase, Phase::Two);
    }

    // ── 履歴 ──────────────────────────────────────────────

    #[test]
    fn stored_history_is_sorted_and_capped() {
        let entries: Vec<_> = (0..60).map(sample_entry).collect();
        let json = serde_json::to_string(&entries).unwrap();
        let (history, dropped) = history_from_json(&json).unwrap();
        assert_eq!(history.len(), MAX_HISTORY);
        assert_eq!(history[0].timestamp, 59);
        assert_eq!(dropped, 0);
    }

    #[test]
    fn stored_history_accepts_legacy_names() {
        let json = r#"[{"timestamp":5,"phase":1,"assignments":[{"character":"ガボ","jobs":["オオカミ少年"]}]}]"#;
        let (history, _) = history_from_json(json).unwrap();
        let job = &history[0].assignments[0].jobs[0];
        assert_eq!(job.name, "オオカミ少年");
        assert_eq!(job.category, JobCategory::Basic);
        assert!(!job.mastered);
        assert_eq!(history[0].timing, "");
    }

    #[test]
    fn corrupt_history_is_an_error() {
        assert!(matches!(history_from_json("{"), Err(ImportError::Parse(_))));
        assert!(matches!(
            history_from_json(r#"{"a":1}"#),
            Err(ImportError::UnrecognizedShape)
        ));
    }

    #[test]
    fn one_bad_record_keeps_the_rest() {
        let json = r#"[
            {"timestamp": 2, "phase": 1, "assignments": [{"character": "主人公", "jobs": ["戦士"]}]},
            {"timestamp": 1, "phase": 1},
            {"timestamp": 3, "phase": 1, "assignments": [{"character": "ガボ", "jobs": [{"name": "盗賊", "category": "thief"}]}]},
            {"timestamp": 4, "phase": 1, "assignments": [{"character": "ガボ", "jobs": [{"name": "盗賊", "mastered": null}]}]},
            {"timestamp": 5, "phase": 2, "assignments": []}
        ]"#;
        let (history, dropped) = history_from_json(json).unwrap();
        let times: Vec<i64> = history.iter().map(|e| e.timestamp).collect();
        assert_eq!(times, vec![5, 2]);
        assert_eq!(dropped, 3);
    }

    #[test]
    fn empty_stored_history() {
        let (history, dropped) = history_from_json("[]").unwrap();
        assert!(history.is_empty());
        assert_eq!(dropped, 0);
    }

    // ── エクスポート ──────────────────────────────────────

    #[test]
    fn export_document_shape() {
        let mut s = Session::new();
        s.phase = Phase::Two;
        s.history = vec![sample_entry(10)];
        let json = export_json(&s, 1234).unwrap();
        assert!(json.contains('\n'));

        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["exportedAt"], 1234);
        assert_eq!(value["currentPhase"], 2);
        assert_eq!(value["history"][0]["phaseLabel"], "アイラ加入");
        assert_eq!(value["history"][0]["assignments"][0]["jobs"][0]["category"], "basic");
    }

    #[test]
    fn export_reimports() {
        let mut s = Session::new();
        s.history = vec![sample_entry(2), sample_entry(1)];
        let json = export_json(&s, 0).unwrap();
        assert_eq!(parse_import(&json).unwrap(), s.history);
    }

    // ── インポート ────────────────────────────────────────

    #[test]
    fn import_bare_array() {
        let text = serde_json::to_string(&vec![sample_entry(3)]).unwrap();
        let entries = parse_import(&text).unwrap();
        assert_eq!(entries, vec![sample_entry(3)]);
    }

    #[test]
    fn import_filters_malformed_records() {
        let text = r#"[
            {"timestamp": 1, "phase": 1, "assignments": []},
            {"timestamp": "1", "phase": 1, "assignments": []},
            {"timestamp": 2, "assignments": []},
            {"timestamp": 3, "phase": 1, "assignments": {}},
            {"timestamp": 4, "phase": 1, "assignments": [{"character": "主人公", "jobs": ["戦士"]}]},
            42
        ]"#;
        let entries = parse_import(text).unwrap();
        let times: Vec<i64> = entries.iter().map(|e| e.timestamp).collect();
        assert_eq!(times, vec![1, 4]);
    }

    #[test]
    fn import_with_no_valid_entries() {
        assert!(matches!(
            parse_import(r#"[{"phase": 1}]"#),
            Err(ImportError::NoValidEntries)
        ));
        assert!(matches!(
            parse_import(r#"{"version": 1, "history": []}"#),
            Err(ImportError::NoValidEntries)
        ));
    }

    #[test]
    fn import_rejects_unknown_shapes() {
        assert!(matches!(parse_import("12"), Err(ImportError::UnrecognizedShape)));
        assert!(matches!(
            parse_import(r#"{"entries": []}"#),
            Err(ImportError::UnrecognizedShape)
        ));
        assert!(matches!(parse_import("[1,"), Err(ImportError::Parse(_))));
    }

    #[test]
    fn import_errors_are_readable() {
        let msg = parse_import("[]").unwrap_err().to_string();
        assert_eq!(msg, "有効な履歴データがありません");
    }
}
