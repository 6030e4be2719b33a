//! Read-side views over the store

use super::types::ViewSchema;

/// Texts of the language selected in `settings`
pub static LANG: ViewSchema = ViewSchema {
    name: "lang",
    select: "SELECT t.page, t.id, t.text
FROM text AS t
JOIN settings AS s
  ON t.language = s.current_language",
};

/// Total cargo capacity per ship macro and transport type
pub static SHIPS_MACRO_TRANSPORT_CAPACITY: ViewSchema = ViewSchema {
    name: "ships_macro_transport_capacity",
    select: "SELECT
    ss.ship_macro,
    s.transport,
    SUM(s.capacity) AS total_capacity
FROM ship_storage AS ss
JOIN storage AS s
  ON ss.storage_macro = s.macro
GROUP BY ss.ship_macro, s.transport",
};

pub static STATIONS: ViewSchema = ViewSchema {
    name: "stations",
    select: "SELECT *
FROM component
WHERE type = 'station'",
};

pub static PLAYER_SHIPS: ViewSchema = ViewSchema {
    name: "player_ships",
    select: "SELECT *
FROM component
WHERE type = 'ship' AND owner = 'player'",
};

/// Net trade sum per player ship (sales positive, purchases negative)
pub static PLAYER_SHIPS_WITH_TRADES: ViewSchema = ViewSchema {
    name: "player_ships_with_trades",
    select: "SELECT
    c.id,
    c.type,
    c.class,
    c.owner,
    c.name,
    c.code,
    SUM(
        CASE
            WHEN c.id = t.seller THEN t.trade_sum
            WHEN c.id = t.buyer THEN -t.trade_sum
        END
    ) AS total_trade_sum
FROM component AS c
JOIN trade AS t
  ON t.seller = c.id OR t.buyer = c.id
WHERE c.type = 'ship' AND c.owner = 'player'
GROUP BY c.id, c.type, c.class, c.owner, c.name, c.code",
};

/// Per-ship trade log against stations.
///
/// Container wares are valued against the ware's average price, so a sale
/// counts `sum - avg * volume` and a purchase `avg * volume - sum`; other
/// transports count the raw trade sum. Money columns are in credits.
pub static PLAYER_SHIPS_TRANSACTIONS_LOG: ViewSchema = ViewSchema {
    name: "player_ships_transactions_log",
    select: "SELECT *
FROM (
  SELECT
      ship.id AS id,
      ship.code AS code,
      ship.name AS name,
      ship.class AS class,
      ship.name || ' (' || ship.code || ')' AS full_name,
      cp.code AS counterpart_code,
      cp.name AS counterpart_name,
      cp.owner AS counterpart_faction,
      sn.name AS sector,
      sn.macro AS sector_macro,
      CASE WHEN cp.owner = 'player'
        THEN cp.name || ' (' || cp.code || ')'
        ELSE COALESCE(f.shortname, '') || ' ' || cp.name || cp.nameindex || ' (' || cp.code || ')'
      END AS station,
      t.time AS time,
      'sell' AS operation,
      t.ware AS ware,
      w.text AS ware_name,
      t.price / 100.0 AS price,
      t.volume AS volume,
      t.trade_sum / 100.0 AS trade_sum,
      w.transport AS transport,
      CASE WHEN w.transport = 'container'
        THEN (t.trade_sum - w.price_avg * t.volume) / 100.0
        ELSE t.trade_sum / 100.0
      END AS profit,
      CASE WHEN t.ware = 'rawscrap' OR tc.total_capacity IS NULL
        THEN t.volume
        ELSE tc.total_capacity / w.volume
      END AS cargo_volume
  FROM trade AS t
  JOIN component AS ship
    ON ship.id = t.seller
  JOIN component AS cp
    ON cp.id = t.buyer AND cp.type = 'station'
  LEFT JOIN faction AS f
    ON f.id = cp.owner
  LEFT JOIN cluster_sector_name AS sn
    ON cp.sector = sn.macro
  JOIN ware AS w
    ON w.id = t.ware
  LEFT JOIN ships_macro_transport_capacity AS tc
    ON ship.macro = tc.ship_macro AND w.transport = tc.transport
  WHERE ship.type = 'ship' AND ship.owner = 'player'
UNION ALL
  SELECT
      ship.id AS id,
      ship.code AS code,
      ship.name AS name,
      ship.class AS class,
      ship.name || ' (' || ship.code || ')' AS full_name,
      cp.code AS counterpart_code,
      cp.name AS counterpart_name,
      cp.owner AS counterpart_faction,
      sn.name AS sector,
      sn.macro AS sector_macro,
      CASE WHEN cp.owner = 'player'
        THEN cp.name || ' (' || cp.code || ')'
        ELSE COALESCE(f.shortname, '') || ' ' || cp.name || cp.nameindex || ' (' || cp.code || ')'
      END AS station,
      t.time AS time,
      'buy' AS operation,
      t.ware AS ware,
      w.text AS ware_name,
      t.price / 100.0 AS price,
      t.volume AS volume,
      -t.trade_sum / 100.0 AS trade_sum,
      w.transport AS transport,
      CASE WHEN w.transport = 'container'
        THEN (w.price_avg * t.volume - t.trade_sum) / 100.0
        ELSE -t.trade_sum / 100.0
      END AS profit,
      CASE WHEN t.ware = 'rawscrap' OR tc.total_capacity IS NULL
        THEN t.volume
        ELSE tc.total_capacity / w.volume
      END AS cargo_volume
  FROM trade AS t
  JOIN component AS ship
    ON ship.id = t.buyer
  JOIN component AS cp
    ON cp.id = t.seller AND cp.type = 'station'
  LEFT JOIN faction AS f
    ON f.id = cp.owner
  LEFT JOIN cluster_sector_name AS sn
    ON cp.sector = sn.macro
  JOIN ware AS w
    ON w.id = t.ware
  LEFT JOIN ships_macro_transport_capacity AS tc
    ON ship.macro = tc.ship_macro AND w.transport = tc.transport
  WHERE ship.type = 'ship' AND ship.owner = 'player'
) AS combined
ORDER BY full_name, time",
};

/// All views, dependencies first
pub static ALL_VIEWS: &[&ViewSchema] = &[
    &LANG,
    &SHIPS_MACRO_TRANSPORT_CAPACITY,
    &STATIONS,
    &PLAYER_SHIPS,
    &PLAYER_SHIPS_WITH_TRADES,
    &PLAYER_SHIPS_TRANSACTIONS_LOG,
];
