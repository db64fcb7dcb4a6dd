#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use leakscope_core::archive::{ShortInfo, IP_INFO_FILE, SYMBOLS_FILE};
use leakscope_core::model::{
    Address, CallHistory, Image, LeakDump, LeakFlag, LeakMeta, LeakRecord, LeakStatus, Symbol,
    SymbolInfo,
};
use leakscope_core::persist;

/// Leak in `encrypt`, reached directly from `main` and twice through
/// `helper`.
pub const SHARED: &str = "0x1110";
/// Data and control-flow leak in `keyschedule`, reached once.
pub const SINGLE: &str = "0x1210";

/// Paths of a dump and an archive directory written by [`write_fixture`].
pub struct Fixture {
    pub dump: PathBuf,
    pub archive: PathBuf,
}

impl Fixture {
    pub fn dump_str(&self) -> &str {
        self.dump.to_str().expect("utf-8 path")
    }

    pub fn archive_str(&self) -> &str {
        self.archive.to_str().expect("utf-8 path")
    }
}

fn symbols() -> SymbolInfo {
    let sym = |address: u64, name: &str| Symbol {
        address: Address(address),
        size: 0x100,
        name: name.to_string(),
        kind: "FUNC".to_string(),
    };
    SymbolInfo {
        images: vec![
            Image {
                name: "/lib/libcrypto.so".to_string(),
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
            sym(0x1100, "encrypt"),
            sym(0x1200, "keyschedule"),
        ],
    }
}

fn leak(ip: u64, leakage: f64, flag: LeakFlag) -> LeakRecord {
    LeakRecord {
        ip: Address(ip),
        status: LeakStatus { max_leak_normalized: leakage, generic: true, specific: false },
        meta: Some(LeakMeta { flag, comment: String::new() }),
    }
}

fn dump() -> LeakDump {
    let call =
        |caller: u64, callee: u64| CallHistory::with_context(Address(caller), Address(callee));

    let mut direct = call(0x400160, 0x1100);
    direct.data_leaks.push(leak(0x1110, 0.5, LeakFlag::Leak));
    direct.cf_leaks.push(leak(0x1120, 0.0, LeakFlag::Investigate));

    let mut first = call(0x400210, 0x1100);
    first.data_leaks.push(leak(0x1110, 0.25, LeakFlag::NoLeak));
    let mut second = call(0x400220, 0x1100);
    second.data_leaks.push(leak(0x1110, 0.1, LeakFlag::Investigate));
    let mut helper = call(0x400170, 0x400200);
    helper.children.insert("a".to_string(), first);
    helper.children.insert("b".to_string(), second);

    let mut ks = call(0x400180, 0x1200);
    ks.data_leaks.push(leak(0x1210, 0.0, LeakFlag::Investigate));
    ks.cf_leaks.push(leak(0x1210, 0.0, LeakFlag::Investigate));

    let mut main = call(0, 0x400100);
    main.children.insert("a".to_string(), direct);
    main.children.insert("b".to_string(), helper);
    main.children.insert("c".to_string(), ks);

    let mut root = CallHistory::root();
    root.children.insert("0".to_string(), main);
    LeakDump::new(Some(root))
}

fn short_info() -> BTreeMap<Address, ShortInfo> {
    let asm = |line: u32, src_line: Option<u32>| ShortInfo {
        asm_file: "/lib/libcrypto.so.asm".to_string(),
        asm_line: Some(line),
        src_file: src_line.map(|_| "/src/crypto.c".to_string()),
        src_line: src_line.unwrap_or(0),
    };
    BTreeMap::from([
        (Address(0x1100), asm(0, Some(2))),
        (Address(0x1110), asm(1, Some(4))),
        (Address(0x1120), asm(2, Some(5))),
        (Address(0x1200), asm(3, None)),
        (Address(0x1210), asm(4, None)),
    ])
}

/// Write `dump.json` and an `archive/` directory under `dir`.
pub fn write_fixture(dir: &Path) -> Fixture {
    let dump_path = dir.join("dump.json");
    persist::save(&dump_path, &dump()).expect("write dump");

    let archive = dir.join("archive");
    fs::create_dir_all(archive.join("lib")).expect("lib dir");
    fs::create_dir_all(archive.join("src")).expect("src dir");
    fs::write(archive.join(IP_INFO_FILE), serde_json::to_string(&short_info()).expect("ipinfo"))
        .expect("write ipinfo");
    fs::write(archive.join(SYMBOLS_FILE), serde_json::to_string(&symbols()).expect("symbols"))
        .expect("write symbols");
    fs::write(
        archive.join("lib/libcrypto.so.asm"),
        "1100 <encrypt>:\n1110: mov\n1120: jne\n1200 <keyschedule>:\n1210: mov\n",
    )
    .expect("write asm");
    fs::write(archive.join("src/crypto.c"), "a\nb\nc\nd\ne\nf\n").expect("write src");

    Fixture { dump: dump_path, archive }
}

/// Overwrite the archive's line info without the entry for `address`.
pub fn drop_line_info(fixture: &Fixture, address: u64) {
    let mut info = short_info();
    info.remove(&Address(address));
    fs::write(fixture.archive.join(IP_INFO_FILE), serde_json::to_string(&info).expect("ipinfo"))
        .expect("rewrite ipinfo");
}
