use breakwatch::{
    CodeCache, ComparisonParser, DebugInterface, Debugger, Inline, MmuNotifier, Session,
};
use std::fs;
use std::sync::Arc;

struct Host;

impl CodeCache for Host {
    fn invalidate_icache(&self, _address: u32, _size: u32, _forced: bool) {}
    fn clear_cache(&self) {}
}

impl MmuNotifier for Host {
    fn watch_config_changed(&self) {}
}

impl DebugInterface for Host {
    fn describe(&self, address: u32) -> String {
        format!("sym_{address:x}")
    }
}

const SAVED: &str = "\
[BreakPoints]
$80001000 nb
$80001004 lc r3 == 5 && r4 != 0
[MemoryBreakPoints]
$80003000 80003010 nwc r3 == 5
$80004000 80004000 nrwlb
";

#[test]
fn load_and_save_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.ini");
    fs::write(&path, SAVED).unwrap();

    let session = Session::load(&path).unwrap();
    let mut debugger = Debugger::new(Arc::new(Host));
    debugger.load_session(&Inline, &session, &ComparisonParser);

    assert!(debugger.breakpoints.is_enabled(0x8000_1000));
    assert!(!debugger.breakpoints.is_enabled(0x8000_1004));
    assert!(debugger.watchpoints.find(0x8000_3008, 4).unwrap().ranged);

    let out = dir.path().join("out.ini");
    debugger.save_session().save(&out).unwrap();
    assert_eq!(fs::read_to_string(&out).unwrap(), SAVED);
}

#[test]
fn temporary_breakpoints_are_not_saved() {
    let mut debugger = Debugger::new(Arc::new(Host));
    debugger.breakpoints.add_address(0x8000_1000, true);
    debugger.breakpoints.add_address(0x8000_2000, false);
    let session = debugger.save_session();
    assert_eq!(session.breakpoints, vec!["$80002000 nb"]);
    assert!(session.watchpoints.is_empty());
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Session::load(&dir.path().join("nope.ini")).unwrap_err();
    assert!(matches!(err, breakwatch::Error::Io(_)));
}

#[test]
fn malformed_lines_are_skipped_on_load() {
    let text = "[BreakPoints]\n$80001000 nb\nnot-an-address n\n[MemoryBreakPoints]\n$80003000\n";
    let session = Session::parse(text).unwrap();
    let mut debugger = Debugger::new(Arc::new(Host));
    debugger.load_session(&Inline, &session, &ComparisonParser);
    assert_eq!(debugger.breakpoints.len(), 1);
    assert!(debugger.watchpoints.is_empty());
}
