#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;

use leakscope_core::archive::{MemoryArchive, ShortInfo, ShortInfoMap, IP_INFO_FILE, SYMBOLS_FILE};
use leakscope_core::config::ViewerConfig;
use leakscope_core::editor::TextViews;
use leakscope_core::model::{
    Address, CallHistory, Image, LeakDump, LeakFlag, LeakKey, LeakKind, LeakMeta, LeakRecord,
    LeakStatus, Symbol, SymbolInfo,
};
use leakscope_core::session::Session;

pub const LIB_ASM: &str = "/lib/libfoo.so.asm";
pub const APP_ASM: &str = "/bin/app.asm";
pub const FOO_SRC: &str = "/src/foo.c";

/// `0x400150` in `main`, seen once.
pub const MAIN_LEAK: Address = Address(0x400150);
/// `0x1110` in `foo_enc`, seen in three contexts flagged leak, no_leak and
/// investigate.
pub const SHARED_LEAK: Address = Address(0x1110);
/// `0x1120` control-flow leak in `foo_enc`, seen once.
pub const CF_LEAK: Address = Address(0x1120);
/// `0x1210` in `foo_ks`, seen once and without metadata in the dump.
pub const KS_LEAK: Address = Address(0x1210);

pub const FOO_ENC: Address = Address(0x1100);
pub const FOO_KS: Address = Address(0x1200);

/// Arena positions of the fixture call tree.
pub const MAIN_NODE: usize = 1;
pub const ENC_NODE: usize = 2;
pub const HELPER_NODE: usize = 3;
pub const ENC_VIA_HELPER_C: usize = 4;
pub const ENC_VIA_HELPER_D: usize = 5;
pub const KS_NODE: usize = 6;

pub fn data_key(ip: Address) -> LeakKey {
    LeakKey::new(LeakKind::Data, ip)
}

pub fn symbols() -> SymbolInfo {
    let sym = |address: u64, name: &str| Symbol {
        address: Address(address),
        size: 0x100,
        name: name.to_string(),
        kind: "FUNC".to_string(),
    };
    SymbolInfo {
        images: vec![
            Image {
                name: "/lib/libfoo.so".to_string(),
                lower: Address(0x1000),
                upper: Address(0x2000),
                dynamic: true,
            },
            Image {
                name: "/bin/app".to_string(),
                lower: Address(0x400000),
                upper: Address(0x500000),
                dynamic: false,
            },
        ],
        symbols: vec![
            sym(0x400100, "main"),
            sym(0x400200, "helper"),
            sym(0x1100, "foo_enc"),
            sym(0x1200, "foo_ks"),
        ],
    }
}

pub fn record(ip: Address, leakage: f64, flag: Option<LeakFlag>) -> LeakRecord {
    LeakRecord {
        ip,
        status: LeakStatus { max_leak_normalized: leakage, generic: true, specific: false },
        meta: flag.map(|flag| LeakMeta { flag, comment: String::new() }),
    }
}

fn call(caller: u64, callee: u64) -> CallHistory {
    CallHistory::with_context(Address(caller), Address(callee))
}

/// ```text
/// main                      data 0x400150 (leak)
/// ├── a: foo_enc            data 0x1110 (leak), cf 0x1120
/// ├── b: helper
/// │   ├── c: foo_enc        data 0x1110 (no_leak)
/// │   └── d: foo_enc        data 0x1110 (investigate)
/// └── e: foo_ks             data 0x1210 (no metadata)
/// ```
pub fn history() -> CallHistory {
    let mut main = call(0, 0x400100);
    main.data_leaks.push(record(MAIN_LEAK, 0.5, Some(LeakFlag::Leak)));

    let mut a = call(0x400160, 0x1100);
    a.data_leaks.push(record(SHARED_LEAK, 0.25, Some(LeakFlag::Leak)));
    a.cf_leaks.push(record(CF_LEAK, 0.0, Some(LeakFlag::Investigate)));

    let mut c = call(0x400210, 0x1100);
    c.data_leaks.push(record(SHARED_LEAK, 0.75, Some(LeakFlag::NoLeak)));
    let mut d = call(0x400220, 0x1100);
    d.data_leaks.push(record(SHARED_LEAK, 0.1, Some(LeakFlag::Investigate)));
    let mut b = call(0x400170, 0x400200);
    b.children.insert("c".to_string(), c);
    b.children.insert("d".to_string(), d);

    let mut e = call(0x400180, 0x1200);
    e.data_leaks.push(record(KS_LEAK, 0.0, None));

    main.children.insert("a".to_string(), a);
    main.children.insert("b".to_string(), b);
    main.children.insert("e".to_string(), e);

    let mut root = CallHistory::root();
    root.children.insert("0".to_string(), main);
    root.children.insert("1".to_string(), call(0, 0x400200));
    root
}

pub fn dump() -> LeakDump {
    LeakDump::new(Some(history()))
}

fn short(asm_file: &str, asm_line: Option<u32>, src: Option<(&str, u32)>) -> ShortInfo {
    ShortInfo {
        asm_file: asm_file.to_string(),
        asm_line,
        src_file: src.map(|(f, _)| f.to_string()),
        src_line: src.map_or(0, |(_, l)| l),
    }
}

pub fn short_info() -> ShortInfoMap {
    let mut map = BTreeMap::new();
    map.insert(FOO_ENC, short(LIB_ASM, Some(0), Some((FOO_SRC, 3))));
    map.insert(SHARED_LEAK, short(LIB_ASM, Some(1), Some((FOO_SRC, 10))));
    map.insert(CF_LEAK, short(LIB_ASM, Some(2), Some((FOO_SRC, 12))));
    map.insert(FOO_KS, short(LIB_ASM, Some(3), None));
    map.insert(KS_LEAK, short(LIB_ASM, Some(4), None));
    map.insert(MAIN_LEAK, short(APP_ASM, Some(5), None));
    map.insert(Address(0x400160), short(APP_ASM, Some(6), None));
    map
}

pub fn lib_asm_text() -> String {
    [
        "0000000000001100 <foo_enc>:",
        "    1110:\tmov    (%rdi,%rax,1),%al",
        "    1120:\tjne    1140",
        "0000000000001200 <foo_ks>:",
        "    1210:\tmov    (%rsi,%rdx,1),%cl",
    ]
    .join("\n")
}

pub fn foo_src_text() -> String {
    (1..=15).map(|n| format!("/* line {n} */")).collect::<Vec<_>>().join("\n")
}

/// The archive without `/bin/app.asm`, so `main` has no disassembly view.
pub fn archive() -> MemoryArchive {
    MemoryArchive::new(short_info(), symbols())
        .with_file(LIB_ASM, lib_asm_text())
        .with_file(FOO_SRC, foo_src_text())
}

pub type TestSession = Session<TextViews<MemoryArchive>>;

pub fn session_with(config: &ViewerConfig) -> TestSession {
    Session::open(dump(), &short_info(), symbols(), TextViews::new(archive()), config)
        .expect("open session")
}

pub fn session() -> TestSession {
    session_with(&ViewerConfig::default())
}

/// Write the fixture archive as a directory archive under `dir`.
pub fn write_archive_dir(dir: &Path) {
    std::fs::create_dir_all(dir.join("lib")).expect("lib dir");
    std::fs::create_dir_all(dir.join("src")).expect("src dir");
    std::fs::write(dir.join(IP_INFO_FILE), serde_json::to_string(&short_info()).expect("ipinfo"))
        .expect("write ipinfo");
    std::fs::write(dir.join(SYMBOLS_FILE), serde_json::to_string(&symbols()).expect("symbols"))
        .expect("write symbols");
    std::fs::write(dir.join("lib/libfoo.so.asm"), lib_asm_text()).expect("write asm");
    std::fs::write(dir.join("src/foo.c"), foo_src_text()).expect("write src");
}
