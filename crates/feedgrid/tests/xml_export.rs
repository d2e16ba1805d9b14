//! End-to-end tests for the XML export

use feedgrid::prelude::*;
use pretty_assertions::assert_eq;

fn inventory() -> MemoryStore {
    let store = MemoryStore::new();
    store.add_sheet(
        "doc",
        "Inventory",
        &[&["Item #", "Qty"], &["Nuts & bolts", "12"], &["Washers", "<5"]],
    );
    store
}

#[test]
fn test_to_xml() {
    let store = inventory();
    let session = Session::with_store(store);
    let ws = session.worksheet("doc", &WorksheetQuery::new()).unwrap();

    assert_eq!(
        ws.to_xml().unwrap(),
        "<worksheet>\n\
         <row>\n<Item>Nuts &amp; bolts</Item>\n<Qty>12</Qty>\n</row>\n\n\
         <row>\n<Item>Washers</Item>\n<Qty>&lt;5</Qty>\n</row>\n\n\
         </worksheet>\n"
    );
}

#[test]
fn test_export_reflects_writes() {
    let store = inventory();
    let session = Session::with_store(store);
    let mut ws = session.worksheet("doc", &WorksheetQuery::new()).unwrap();
    ws.set_value(1, "Qty", 7).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inventory.xml");
    ws.save_xml(&path).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("<Qty>7</Qty>"));
    assert!(!written.contains("&lt;5"));
}

#[test]
fn test_export_of_missing_worksheet_fails() {
    let store = inventory();
    let session = Session::with_store(store.clone());
    let ws = session.worksheet("doc", &WorksheetQuery::new()).unwrap();
    store.add_document("doc", "Replaced");

    let err = ws.to_xml().unwrap_err();
    assert!(matches!(err, XmlError::Core(e) if e.is_remote()));
}
