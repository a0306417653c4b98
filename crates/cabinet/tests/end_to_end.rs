//! Build a database from a document, write it to disk and load it back.

use std::io::{BufReader, Cursor};
use std::sync::atomic::AtomicBool;

use cabinet::infodb::{Error, InfoDatabase, InfoDbBuilder};
use cabinet::worker::{ListXmlStatus, ListXmlTask, StatusState, WorkerController};

const DOC: &str = r#"<?xml version="1.0"?>
<mame build="0.999 (test)" debug="no">
    <machine name="bbb" cloneof="aaa" romof="aaa">
        <description>Second &amp; Clone</description>
        <rom name="b.bin" size="16" crc="0badf00d"/>
    </machine>
    <machine name="aaa">
        <description>First</description>
        <rom name="a.bin" size="32" crc="deadbeef"/>
    </machine>
</mame>"#;

#[test]
fn test_build_and_load() {
    let mut builder = InfoDbBuilder::new();
    builder.process_xml(DOC.as_bytes(), None, None).unwrap();
    let db = InfoDatabase::from_bytes(builder.to_bytes().unwrap(), Some("0.999 (test)")).unwrap();

    let names: Vec<_> = db.machines().iter().map(|m| m.name().to_owned_string()).collect();
    assert_eq!(names, ["aaa", "bbb"]);

    for machine in db.machines() {
        assert_eq!(machine.roms().len(), 1);
    }

    let aaa = db.find_machine("aaa").unwrap();
    assert_eq!(aaa.index(), 0);
    assert_eq!(aaa.description(), "First");
    assert_eq!(aaa.roms().get(0).unwrap().name(), "a.bin");
    assert_eq!(aaa.roms().get(0).unwrap().size(), 32);

    let bbb = db.find_machine("bbb").unwrap();
    assert_eq!(bbb.description(), "Second & Clone");
    assert_eq!(bbb.clone_of().unwrap().index(), aaa.index());
    assert_eq!(bbb.rom_of().unwrap().name(), "aaa");
    assert_eq!(bbb.roms().get(0).unwrap().crc(), Some([0x0B, 0xAD, 0xF0, 0x0D]));

    assert!(db.find_machine("ccc").is_none());
}

#[test]
fn test_listxml_task_round_trip() {
    let dir = std::env::temp_dir().join(format!("cabinet-e2e-{}", std::process::id()));
    let path = dir.join("db").join("machines.infodb");

    let task = ListXmlTask::new(&path);
    let (tx, rx) = crossbeam_channel::unbounded();
    let status = task.process(BufReader::new(Cursor::new(DOC)), &tx);
    assert_eq!(status, ListXmlStatus::Success);
    assert_eq!(rx.try_iter().count(), 3);

    let db = InfoDatabase::open(&path, Some("0.999 (test)")).unwrap();
    assert_eq!(db.machines().len(), 2);

    let err = InfoDatabase::open(&path, Some("1.000 (test)")).unwrap_err();
    assert!(err.needs_rebuild());

    drop(db);
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_cancelled_build_cannot_emit() {
    let cancel = AtomicBool::new(true);
    let mut builder = InfoDbBuilder::new();
    let err = builder.process_xml(DOC.as_bytes(), None, Some(&cancel)).unwrap_err();
    assert!(err.is_cancelled());
    assert!(matches!(builder.to_bytes(), Err(Error::NotBuilt)));
}

#[test]
fn test_scripted_worker_conversation() {
    let script = concat!(
        "@OK STATUS <status paused=\"0\" throttled=\"1\" speed_text=\"100%\"/>\r\n",
        "@STATUS <status speed_text=\"240%\"/>\r\n",
        "@OK STATUS <status throttled=\"0\"/>\r\n",
        "@OK STATUS <status paused=\"1\"/>\r\n",
    );
    let mut controller = WorkerController::new(Cursor::new(script), Vec::new());
    let mut state = StatusState::default();

    let response = controller.receive_response(|update| state.apply(update)).unwrap();
    state.apply(response.update.unwrap());

    let mut pushes = Vec::new();
    let response = controller.execute("throttled 0", |update| pushes.push(update)).unwrap();
    for update in pushes {
        state.apply(update);
    }
    state.apply(response.update.unwrap());
    assert_eq!(state.speed_text, "240%");
    assert!(!state.throttled);

    let response = controller.execute("pause", |_| {}).unwrap();
    state.apply(response.update.unwrap());
    assert!(state.paused);

    let (_, written) = controller.into_inner();
    assert_eq!(written, b"throttled 0\r\npause\r\n");
}
