//! KappaView Engine Integration Tests
//!
//! Loads profiles and Lua modules from disk and polls them against an
//! in-memory process image.

use kappa_common::{DisplayValue, Error, MemoryError, ProfileError, Scalar, Value};
use kappa_core::{Engine, MemoryAccess};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Process image shared between the test and the engine
#[derive(Clone, Default)]
struct FakeProcess {
    bytes: Arc<Mutex<HashMap<u64, u8>>>,
    alive: Arc<AtomicBool>,
}

impl FakeProcess {
    fn new() -> Self {
        let process = Self::default();
        process.alive.store(true, Ordering::SeqCst);
        process
    }

    fn write(&self, address: u64, data: &[u8]) {
        let mut bytes = self.bytes.lock().unwrap();
        for (i, b) in data.iter().enumerate() {
            bytes.insert(address + i as u64, *b);
        }
    }

    fn write_i32(&self, address: u64, value: i32) {
        self.write(address, &value.to_ne_bytes());
    }

    fn exit(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.bytes.lock().unwrap().clear();
    }
}

impl MemoryAccess for FakeProcess {
    fn read(&self, address: u64, size: usize) -> Result<Vec<u8>, MemoryError> {
        let bytes = self.bytes.lock().unwrap();
        (0..size as u64)
            .map(|i| {
                bytes
                    .get(&address.wrapping_add(i))
                    .copied()
                    .ok_or_else(|| MemoryError::Read {
                        address,
                        size,
                        message: "page not mapped".to_string(),
                    })
            })
            .collect()
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    profile: PathBuf,
}

fn write_profile(profile: &str, modules: &[(&str, &str)]) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    for (name, source) in modules {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, source).unwrap();
    }
    let path = dir.path().join("profile.json");
    std::fs::write(&path, profile).unwrap();
    Fixture {
        profile: path,
        _dir: dir,
    }
}

fn attached(path: &Path) -> (Engine, FakeProcess) {
    let mut engine = Engine::load(path).unwrap();
    let process = FakeProcess::new();
    engine.attach(Box::new(process.clone()));
    (engine, process)
}

const GAME_PROFILE: &str = r#"{
    "Version": "2.1",
    "Target": "game",
    "Platform": 64,
    "Import": ["lib/util.lua", "game.lua"],
    "Reset": { "Parameters": ["Stage"] },
    "Stage": {
        "Name": "Stage",
        "Description": "Current stage number",
        "Type": "Static",
        "DataType": "UInt8",
        "Address": ["1000", "8"],
        "Display": { "0": "Title", "1": "Forest", "2": "Castle" }
    },
    "Kills": {
        "Name": "Kills",
        "Type": "Counter",
        "DataType": "Int32",
        "Address": ["1000", "10"],
        "Display": {}
    },
    "Player": {
        "Name": "Player",
        "Type": "Static",
        "DataType": "Char:8",
        "Address": ["2000"],
        "Display": {}
    },
    "Score": {
        "Name": "Score",
        "Type": "Custom",
        "DataType": "Int64",
        "Parameters": ["Kills", "Stage"],
        "Display": {}
    },
    "HP": {
        "Name": "HP",
        "Type": "Static",
        "DataType": "Int32",
        "Address": ["A0"]
    }
}"#;

const UTIL_LUA: &str = r#"
function increased(old, new)
    return new > old
end
"#;

const GAME_LUA: &str = r#"
function Reset(stage)
    return stage == 0
end

function Kills(old, new)
    return increased(old, new)
end

function Score(kills, stage)
    return kills * 100 + stage
end
"#;

fn game() -> Fixture {
    write_profile(
        GAME_PROFILE,
        &[("lib/util.lua", UTIL_LUA), ("game.lua", GAME_LUA)],
    )
}

/// Base object at 0x5000 holding stage at +8 and kills at +0x10
fn seed(process: &FakeProcess) {
    process.write(0x1000, &0x5000u64.to_ne_bytes());
    process.write(0x5008, &[1]);
    process.write_i32(0x5010, 0);
    process.write(0x2000, b"hero\0\0\0\0");
    process.write_i32(0xA0, 100);
}

fn rows(engine: &mut Engine) -> Vec<(String, String)> {
    engine
        .poll()
        .unwrap()
        .into_iter()
        .map(|row| (row.label, row.value.to_string()))
        .collect()
}

#[test]
fn test_metadata() {
    let fixture = game();
    let engine = Engine::load(&fixture.profile).unwrap();
    assert_eq!(engine.target_name(), "game");
    assert_eq!(engine.profile_version().to_string(), "2.1.0");
    assert_eq!(engine.pointer_width().bits(), 64);
    let keys: Vec<&str> = engine.resources().iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys, vec!["Stage", "Kills", "Player", "Score", "HP"]);
}

#[test]
fn test_full_session() {
    let fixture = game();
    let (mut engine, process) = attached(&fixture.profile);
    seed(&process);

    // Stage resolves through the pointer at 0x1000; HP has no display map
    assert_eq!(
        rows(&mut engine),
        vec![
            ("Stage".to_string(), "Forest".to_string()),
            ("Kills".to_string(), "0".to_string()),
            ("Player".to_string(), "hero".to_string()),
            ("Score".to_string(), "0".to_string()),
        ]
    );
    assert_eq!(
        engine.state("HP").unwrap().displayed,
        Value::Scalar(Scalar::Int32(100))
    );

    process.write_i32(0x5010, 1);
    let second = rows(&mut engine);
    assert_eq!(second[1], ("Kills".to_string(), "1".to_string()));
    // Score saw the displayed values from before this poll
    assert_eq!(second[3], ("Score".to_string(), "1".to_string()));

    process.write_i32(0x5010, 4);
    process.write(0x5008, &[2]);
    let third = rows(&mut engine);
    assert_eq!(third[0], ("Stage".to_string(), "Castle".to_string()));
    assert_eq!(third[1], ("Kills".to_string(), "2".to_string()));
    assert_eq!(third[3], ("Score".to_string(), "101".to_string()));

    // Back to the title screen: the next poll resets the counter
    process.write(0x5008, &[0]);
    let fourth = rows(&mut engine);
    assert_eq!(fourth[0], ("Stage".to_string(), "Title".to_string()));
    assert_eq!(fourth[1], ("Kills".to_string(), "2".to_string()));

    let fifth = rows(&mut engine);
    assert_eq!(fifth[1], ("Kills".to_string(), "0".to_string()));
}

#[test]
fn test_target_exit_fails_poll_and_keeps_state() {
    let fixture = game();
    let (mut engine, process) = attached(&fixture.profile);
    seed(&process);
    engine.poll().unwrap();
    process.write_i32(0x5010, 3);
    engine.poll().unwrap();
    let kills = engine.state("Kills").unwrap().clone();

    process.exit();
    assert!(!engine.is_target_running());
    let err = engine.poll().unwrap_err();
    match &err {
        Error::Resource { resource, .. } => assert_eq!(resource, "Stage"),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(matches!(
        err.root(),
        Error::Memory(MemoryError::PointerRead { address: 0x1000, .. })
    ));
    assert_eq!(engine.state("Kills").unwrap(), &kills);
}

#[test]
fn test_session_on_worker_thread() {
    let fixture = game();
    let (mut engine, process) = attached(&fixture.profile);
    seed(&process);

    let worker = std::thread::spawn(move || {
        let first = rows(&mut engine);
        (engine, first)
    });
    let (mut engine, first) = worker.join().unwrap();
    assert_eq!(first[0], ("Stage".to_string(), "Forest".to_string()));

    process.write_i32(0x5010, 1);
    assert_eq!(rows(&mut engine)[1], ("Kills".to_string(), "1".to_string()));
}

#[test]
fn test_script_error_surfaces_with_resource() {
    let fixture = write_profile(
        r#"{
            "Version": "1.0", "Target": "game", "Platform": 32, "Import": ["bad.lua"],
            "Ratio": { "Name": "Ratio", "Type": "Custom", "DataType": "Float", "Parameters": [], "Display": {} }
        }"#,
        &[("bad.lua", "function Ratio() error('division by zero') end")],
    );
    let mut engine = Engine::load(&fixture.profile).unwrap();
    let err = engine.poll().unwrap_err();
    assert!(err.to_string().contains("Ratio"));
    assert!(matches!(err.root(), Error::Script(_)));
}

#[test]
fn test_load_failures() {
    let fixture = write_profile(
        r#"{
            "Version": "1.0", "Target": "game", "Platform": 64, "Import": ["missing.lua"]
        }"#,
        &[],
    );
    assert!(matches!(
        Engine::load(&fixture.profile).unwrap_err(),
        Error::Script(_)
    ));

    let fixture = write_profile(
        r#"{
            "Version": "1.0", "Target": "game", "Platform": 64, "Import": [],
            "HP": { "Name": "HP", "DataType": "Int32", "Type": "Static" }
        }"#,
        &[],
    );
    assert!(matches!(
        Engine::load(&fixture.profile).unwrap_err(),
        Error::Profile(ProfileError::MissingAddress(ref key)) if key == "HP"
    ));
}

#[test]
fn test_pointer_width_32() {
    let fixture = write_profile(
        r#"{
            "Version": "1.0", "Target": "game", "Platform": 32, "Import": [],
            "Gold": { "Name": "Gold", "Type": "Static", "DataType": "UInt16", "Address": ["0x40", "0x4"], "Display": {} }
        }"#,
        &[],
    );
    let (mut engine, process) = attached(&fixture.profile);
    process.write(0x40, &0x900u32.to_ne_bytes());
    process.write(0x904, &512u16.to_ne_bytes());
    let rows = engine.poll().unwrap();
    assert_eq!(
        rows[0].value,
        DisplayValue::Raw(Value::Scalar(Scalar::UInt16(512)))
    );
}

#[test]
fn test_sample_profile_loads() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../profiles/sample.json");
    let (mut engine, process) = attached(&path);
    assert_eq!(engine.target_name(), "game");

    process.write(0x1A2B30, &0x7000u64.to_ne_bytes());
    process.write(0x7048, &[1]);
    process.write(0x1A2B38, &0x8000u64.to_ne_bytes());
    process.write(0x8010, &0x9000u64.to_ne_bytes());
    process.write_i32(0x902C, 50);
    process.write_i32(0x9030, 200);
    process.write(0x1A2B40, b"Kappa\0\0\0\0\0\0\0\0\0\0\0");

    engine.poll().unwrap();
    let labels: Vec<(String, String)> = rows(&mut engine);
    assert_eq!(
        labels,
        vec![
            ("Stage".to_string(), "Forest".to_string()),
            ("Deaths".to_string(), "0".to_string()),
            ("Health".to_string(), "25".to_string()),
            ("Player".to_string(), "Kappa".to_string()),
        ]
    );
}
