//! End-to-end tests over a small game folder and save written to a temp dir.
//!
//! These tests:
//! 1. Load the catalogs of a base game plus one extension, twice
//! 2. Import a gzip save against those catalogs and read the views back
//! 3. Feed the link buffers in every order
//! 4. Round-trip sampled text keys
//!
//! Run with:
//! ```sh
//! cargo test --test integration_test
//! ```

use flate2::write::GzEncoder;
use flate2::Compression;
use once_cell::sync::Lazy;
use rand::{Rng, SeedableRng};
use rusqlite::Connection;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use x4_save_to_sqlite::config::LoadOptions;
use x4_save_to_sqlite::content::{ContentXmlOrder, FsProvider};
use x4_save_to_sqlite::localization::TextKey;
use x4_save_to_sqlite::progress::{Counter, NullSink};
use x4_save_to_sqlite::save::links::{GateSide, HighwayLinker, SubordinateLinker};
use x4_save_to_sqlite::schema::SchemaStatus;
use x4_save_to_sqlite::writer::sqlite::list_objects;
use x4_save_to_sqlite::{import_save, load_catalogs, Stats, Store};

// =============================================================================
// Test Configuration
// =============================================================================

/// Random seed for reproducible sampling
const RANDOM_SEED: u64 = 42;

/// Number of sampled text keys
const SAMPLE_SIZE: usize = 1000;

// =============================================================================
// Game Folder Fixture
// =============================================================================

const LANG_DAT: &str = "44\n";

const TEXTS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<language id="44">
  <page id="20201">
    <t id="701">Energy Cells</t>
    <t id="704">Energy Cell Production</t>
    <t id="801">Silicon</t>
  </page>
  <page id="20101">
    <t id="1">Mercury {20101,2}(ship name)</t>
    <t id="2">Vanguard</t>
  </page>
  <page id="20203">
    <t id="201">Argon Federation</t>
    <t id="204">ARG</t>
  </page>
  <page id="20003">
    <t id="10001">Argon Prime</t>
  </page>
</language>"#;

const WARES: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<wares>
  <ware id="energycells" name="{20201,701}" group="energy" transport="container" volume="6">
    <price min="10" average="16" max="22"/>
  </ware>
  <ware id="ship_arg_m_trans_container_01_a" name="{20101,1}" group="ships" transport="ship" volume="1">
    <price min="1" average="1" max="1"/>
    <component ref="ship_arg_m_trans_container_01_a_macro"/>
  </ware>
</wares>"#;

const EXTENSION_WARES: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<diff>
  <add sel="/wares">
    <ware id="silicon" name="{20201,801}" group="minerals" transport="solid" volume="10">
      <price min="100" average="133" max="166"/>
    </ware>
    <ware id="energycells" name="Patched" group="energy" transport="container" volume="99"/>
  </add>
</diff>"#;

const EXTENSION_CONTENT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<content id="ego_dlc_test" name="Test" version="100" enabled="1">
  <dependency id="ego_dlc_missing" optional="true"/>
</content>"#;

const FACTIONS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<factions>
  <faction id="argon" name="{20203,201}" shortname="{20203,204}" prefixname="{20203,201}"/>
</factions>"#;

const MAP_DEFAULTS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<defaults>
  <dataset macro="Cluster_01_Sector001_macro">
    <properties><identification name="{20003,10001}"/></properties>
  </dataset>
</defaults>"#;

const SHIP_MACRO: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<macros>
  <macro name="ship_arg_m_trans_container_01_a_macro" class="ship_m">
    <properties><ship type="freighter"/></properties>
    <connections>
      <connection ref="con_storage01">
        <macro ref="storage_arg_m_trans_container_01_a_macro" connection="ShipConnection"/>
      </connection>
    </connections>
  </macro>
</macros>"#;

const STORAGE_MACRO: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<macros>
  <macro name="storage_arg_m_trans_container_01_a_macro" class="storage">
    <properties><cargo max="9800" tags="container"/></properties>
  </macro>
</macros>"#;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Shared game folder - created once and reused for all tests
static GAME_DIR: Lazy<TempDir> = Lazy::new(|| {
    let dir = TempDir::new().expect("Failed to create game folder");
    let root = dir.path();

    write(root, "lang.dat", LANG_DAT);
    write(root, "t/0001-l044.xml", TEXTS);
    write(root, "libraries/wares.xml", WARES);
    write(root, "libraries/factions.xml", FACTIONS);
    write(root, "libraries/mapdefaults.xml", MAP_DEFAULTS);
    write(
        root,
        "assets/units/size_m/macros/ship_arg_m_trans_container_01_a_macro.xml",
        SHIP_MACRO,
    );
    write(
        root,
        "assets/units/size_m/macros/storage_arg_m_trans_container_01_a_macro.xml",
        STORAGE_MACRO,
    );
    write(root, "extensions/ego_dlc_test/content.xml", EXTENSION_CONTENT);
    write(root, "extensions/ego_dlc_test/libraries/wares.xml", EXTENSION_WARES);

    dir
});

fn open_store(dir: &TempDir) -> Store {
    Store::open(&dir.path().join("x4.db")).expect("Failed to open store")
}

fn load(store: &mut Store, options: &LoadOptions) {
    load_catalogs(
        store,
        Some(GAME_DIR.path()),
        &FsProvider,
        &ContentXmlOrder,
        options,
        &mut NullSink,
    )
    .expect("Failed to load catalogs");
}

fn strings(conn: &Connection, sql: &str) -> Vec<String> {
    let mut stmt = conn.prepare(sql).unwrap();
    let rows = stmt.query_map([], |row| row.get::<_, String>(0)).unwrap();
    rows.map(|r| r.unwrap()).collect()
}

// =============================================================================
// Catalog Tests
// =============================================================================

#[test]
fn test_catalog_load_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    let options = LoadOptions::default();

    load(&mut store, &options);
    let first = Stats::collect(store.conn().unwrap()).unwrap();
    load(&mut store, &options);
    let second = Stats::collect(store.conn().unwrap()).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.wares, 3);
    assert_eq!(first.factions, 1);
    assert_eq!(first.sector_names, 1);
    assert_eq!(first.storages, 1);
    assert_eq!(first.ship_storages, 1);
    assert_eq!(first.ship_types, 1);
    assert_eq!(first.languages, 1);
    assert_eq!(first.current_language, 44);
}

#[test]
fn test_catalog_content() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    load(&mut store, &LoadOptions::default());
    let conn = store.conn().unwrap();

    assert_eq!(
        strings(
            conn,
            "SELECT id || '|' || transport || '|' || volume || '|' || price_avg || '|' || text FROM ware ORDER BY id",
        ),
        vec![
            "energycells|container|6|1600|Energy Cells",
            "ship_arg_m_trans_container_01_a|ship|1|100|Mercury Vanguard",
            "silicon|solid|10|13300|Silicon",
        ]
    );
    assert_eq!(
        strings(conn, "SELECT id || '|' || name || '|' || shortname FROM faction"),
        vec!["argon|Argon Federation|ARG"]
    );
    assert_eq!(
        strings(conn, "SELECT macro || '|' || name FROM cluster_sector_name"),
        vec!["cluster_01_sector001_macro|Argon Prime"]
    );
    assert_eq!(
        strings(
            conn,
            "SELECT ship_macro || '|' || transport || '|' || total_capacity FROM ships_macro_transport_capacity",
        ),
        vec!["ship_arg_m_trans_container_01_a_macro|container|9800"]
    );
}

// =============================================================================
// Save Import Tests
// =============================================================================

const SAVE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<savegame>
  <info><game time="1000" code="1"/></info>
  <universe>
    <component class="galaxy" macro="xu_ep2_universe_macro" id="[0x1]" knownto="player">
      <connections><connection connection="clusters">
        <component class="cluster" macro="cluster_01_macro" id="[0x2]" knownto="player">
          <connections><connection connection="sectors">
            <component class="sector" macro="cluster_01_sector001_macro" id="[0x3]" knownto="player">
              <connections><connection connection="zones">
                <component class="zone" macro="zone001_macro" id="[0x4]" knownto="player">
                  <connections>
                    <connection connection="ships">
                      <component class="ship_m" macro="ship_arg_m_trans_container_01_a_macro" id="[0x10]" owner="player" code="ABC-123" knownto="player"/>
                    </connection>
                    <connection connection="stations">
                      <component class="station" macro="station_pla_macro" id="[0x20]" owner="player" code="XYZ-999" knownto="player" name="My Base"/>
                      <component class="station" macro="station_arg_macro" id="[0x30]" owner="argon" code="NPC-001" knownto="player">
                        <connections><connection connection="modules">
                          <component class="production" macro="prod_gen_energycells_macro" id="[0x31]"/>
                        </connection></connections>
                      </component>
                    </connection>
                  </connections>
                </component>
              </connection></connections>
            </component>
          </connection></connections>
        </component>
      </connection></connections>
    </component>
  </universe>
  <log>
    <entries type="trade">
      <log time="1100" type="trade" seller="[0x10]" buyer="[0x20]" ware="energycells" price="2000" v="100"/>
      <log time="1200" type="trade" seller="[0x30]" buyer="[0x10]" ware="energycells" price="1200" v="100"/>
    </entries>
  </log>
</savegame>"#;

fn write_gzip_save(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("quicksave.xml.gz");
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(SAVE.as_bytes()).unwrap();
    fs::write(&path, encoder.finish().unwrap()).unwrap();
    path
}

#[test]
fn test_import_save_end_to_end() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    let options = LoadOptions::default();
    load(&mut store, &options);

    let save = write_gzip_save(&dir);
    let report = import_save(&mut store, Some(&save), &options, &mut NullSink).unwrap();
    assert_eq!(report.get(Counter::Ships), 1);
    assert_eq!(report.get(Counter::Trades), 2);
    assert_eq!(report.unresolved.total(), 0);

    let conn = store.conn().unwrap();
    assert_eq!(
        strings(conn, "SELECT name || '|' || code FROM player_ships"),
        vec!["Mercury Vanguard|ABC-123"]
    );
    assert_eq!(
        strings(conn, "SELECT name FROM stations ORDER BY id"),
        vec!["My Base", "Energy Cell Production"]
    );

    let mut stmt = conn
        .prepare(
            "SELECT operation, station, sector, profit, cargo_volume
             FROM player_ships_transactions_log WHERE id = 16 ORDER BY time",
        )
        .unwrap();
    let rows: Vec<(String, String, String, f64, i64)> = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        })
        .unwrap()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].0, "sell");
    assert_eq!(rows[0].1, "My Base (XYZ-999)");
    assert_eq!(rows[0].2, "Argon Prime");
    assert_eq!(rows[1].0, "buy");
    assert_eq!(rows[1].1, "ARG Energy Cell Production (NPC-001)");
    assert_eq!(rows[0].4, 9800 / 6);

    // container profit: sell sum minus buy sum
    let profit: f64 = rows.iter().map(|r| r.3).sum();
    assert!((profit - (2000.0 * 100.0 - 1200.0 * 100.0) / 100.0).abs() < 1e-9);

    let total: i64 = conn
        .query_row(
            "SELECT total_trade_sum FROM player_ships_with_trades WHERE id = 16",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(total, 80_000);
}

#[test]
fn test_missing_save_leaves_store_untouched() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    let options = LoadOptions::default();
    load(&mut store, &options);
    let save = write_gzip_save(&dir);
    import_save(&mut store, Some(&save), &options, &mut NullSink).unwrap();

    let missing = dir.path().join("missing.xml.gz");
    import_save(&mut store, Some(&missing), &options, &mut NullSink).unwrap();

    let stats = Stats::collect(store.conn().unwrap()).unwrap();
    assert_eq!(stats.trades, 2);
    assert_eq!(stats.player_ships, 1);
}

// =============================================================================
// Schema Tests
// =============================================================================

#[test]
fn test_schema_is_stable_across_opens() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("x4.db");

    let mut store = Store::open(&path).unwrap();
    assert_eq!(store.schema_status(), &SchemaStatus::Created);
    let first: Vec<String> = list_objects(store.conn().unwrap())
        .unwrap()
        .into_iter()
        .map(|o| format!("{}:{}", o.kind, o.name))
        .collect();
    store.close();

    let mut store = Store::open(&path).unwrap();
    assert_eq!(store.schema_status(), &SchemaStatus::Current);
    let second: Vec<String> = list_objects(store.conn().unwrap())
        .unwrap()
        .into_iter()
        .map(|o| format!("{}:{}", o.kind, o.name))
        .collect();

    assert_eq!(first, second);
}

// =============================================================================
// Link Order Tests
// =============================================================================

fn permutations(n: usize) -> Vec<Vec<usize>> {
    if n == 0 {
        return vec![Vec::new()];
    }
    let mut result = Vec::new();
    for rest in permutations(n - 1) {
        for position in 0..=rest.len() {
            let mut order = rest.clone();
            order.insert(position, n - 1);
            result.push(order);
        }
    }
    result
}

#[test]
fn test_superhighway_order_independent() {
    for order in permutations(3) {
        let mut linker = HighwayLinker::new();
        let mut rows = Vec::new();
        for step in &order {
            let row = match step {
                0 => linker.add_highway(100, "superhighway001_macro", 11, 12),
                1 => linker.add_gate(GateSide::Entry, 11, "sector_a"),
                _ => linker.add_gate(GateSide::Exit, 12, "sector_b"),
            };
            rows.extend(row);
        }

        assert_eq!(rows.len(), 1, "order {:?}", order);
        assert_eq!(rows[0].sector_from, "sector_a");
        assert_eq!(rows[0].sector_to, "sector_b");
        assert_eq!(linker.pending_highways() + linker.pending_gates(), 0);
    }
}

#[test]
fn test_subordinate_order_independent() {
    for order in permutations(4) {
        let mut linker = SubordinateLinker::new();
        let mut links = Vec::new();
        for step in &order {
            links.extend(match step {
                0 => linker.add_group(1, 2, "mining"),
                1 => linker.add_member_group(7, 2),
                2 => linker.add_commander(1, 50),
                _ => linker.add_subordinate(7, 50),
            });
        }

        assert_eq!(links.len(), 1, "order {:?}", order);
        assert_eq!(links[0].commander_id, 1);
        assert_eq!(links[0].subordinate_id, 7);
        assert_eq!(links[0].assignment, "mining");
        assert_eq!(linker.pending(), 0);
    }
}

// =============================================================================
// Text Key Tests
// =============================================================================

#[test]
fn test_text_key_round_trip_sampled() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(RANDOM_SEED);
    for _ in 0..SAMPLE_SIZE {
        let language: u16 = rng.gen();
        let page = rng.gen_range(0..(1u32 << 24));
        let id = rng.gen_range(0..(1u32 << 24));

        let key = TextKey::new(language, page, id).unwrap();
        assert_eq!(TextKey::unpack(key.pack()), key);
    }

    assert!(TextKey::new(44, 1 << 24, 1).is_none());
    assert!(TextKey::new(44, 1, 1 << 24).is_none());
}
