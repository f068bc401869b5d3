//! SQL schemas for the warehouse and for operational fixtures.
//!
//! Both are executed at connection startup and are idempotent thanks to
//! `CREATE TABLE IF NOT EXISTS`. Dates are stored as `YYYY-MM-DD` text and
//! flags as 0/1 integers.

/// The star schema written by [`crate::SqliteWarehouse`].
pub const WAREHOUSE_SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS dim_dosen_wali (
    dosen_wali_id INTEGER PRIMARY KEY,
    nama          TEXT,
    email         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS dim_mahasiswa (
    mahasiswa_id    INTEGER PRIMARY KEY,
    nrp             TEXT NOT NULL,
    nama            TEXT,
    email           TEXT NOT NULL,
    nama_jurusan    TEXT,
    nama_dosen_wali TEXT
);

CREATE TABLE IF NOT EXISTS dim_status_perubahan_kelas (
    status_perubahan_kelas_id INTEGER PRIMARY KEY,
    status                    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS dim_waktu (
    waktu_id          INTEGER PRIMARY KEY,
    tanggal           TEXT NOT NULL,   -- YYYY-MM-DD
    hari              TEXT NOT NULL,
    bulan             TEXT NOT NULL,
    tahun             INTEGER NOT NULL,
    semester_akademik TEXT NOT NULL    -- 'Genap' | 'Ganjil'
);

-- Type 2: one row per version of a (kode_mata_kuliah, nama_kelas) offering.
-- Only row_expiration_date and current_row_flag are ever updated.
CREATE TABLE IF NOT EXISTS dim_mata_kuliah (
    mata_kuliah_id      INTEGER PRIMARY KEY,
    kode_mata_kuliah    TEXT NOT NULL,
    nama                TEXT,
    sks                 INTEGER,
    nama_kelas          TEXT NOT NULL,
    dosen               TEXT,
    kapasitas           INTEGER,
    row_effective_date  TEXT NOT NULL,
    row_expiration_date TEXT NOT NULL,   -- '9999-12-31' while current
    current_row_flag    TEXT NOT NULL    -- 'Current' | 'Expired'
);

-- Facts are append-only.
CREATE TABLE IF NOT EXISTS fact_pengambilan_kelas (
    pengambilan_kelas_id INTEGER PRIMARY KEY,
    mahasiswa_id         INTEGER NOT NULL,
    mata_kuliah_id       INTEGER NOT NULL,
    waktu_id             INTEGER NOT NULL,
    sks_diambil          INTEGER NOT NULL,
    ipk_terakhir         REAL NOT NULL,
    sudah_bayar_flag     INTEGER NOT NULL,
    is_drop              INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS fact_perubahan_kelas (
    perubahan_kelas_id        INTEGER PRIMARY KEY,
    mata_kuliah_id            INTEGER NOT NULL,
    mahasiswa_id              INTEGER NOT NULL,
    status_perubahan_kelas_id INTEGER NOT NULL,
    waktu_id                  INTEGER NOT NULL,
    jumlah_drop               INTEGER NOT NULL,
    jumlah_add                INTEGER NOT NULL,
    sks_setelah_perubahan     INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS fact_persetujuan_frs (
    persetujuan_frs_id   INTEGER PRIMARY KEY,
    mahasiswa_id         INTEGER NOT NULL,
    dosen_wali_id        INTEGER NOT NULL,
    waktu_persetujuan_id INTEGER NOT NULL,
    is_frs_disetujui     INTEGER NOT NULL,
    jumlah_sks           INTEGER NOT NULL,
    ipk_terakhir         REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS fact_pembatalan_frs (
    pembatalan_frs_id          INTEGER PRIMARY KEY,
    mahasiswa_id               INTEGER NOT NULL,
    waktu_pengajuan_id         INTEGER NOT NULL,
    waktu_verifikasi_id        INTEGER NOT NULL,
    ipk_terakhir               REAL NOT NULL,
    lama_verifikasi_pembatalan INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS dim_mata_kuliah_natural_idx
    ON dim_mata_kuliah(kode_mata_kuliah, nama_kelas);
CREATE INDEX IF NOT EXISTS dim_waktu_tanggal_idx ON dim_waktu(tanggal);

PRAGMA user_version = 1;
";

/// The operational tables read by [`crate::SqliteSource`]. Only created for
/// fixtures; a production source database already has them.
pub const OPERATIONAL_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS jurusan (
    jurusan_id   INTEGER PRIMARY KEY,
    nama_jurusan TEXT
);

CREATE TABLE IF NOT EXISTS dosen_wali (
    id    INTEGER PRIMARY KEY,
    nama  TEXT,
    email TEXT
);

CREATE TABLE IF NOT EXISTS mahasiswa (
    id            INTEGER PRIMARY KEY,
    nrp           TEXT,
    nama          TEXT,
    email         TEXT,
    jurusan_id    INTEGER,
    dosen_wali_id INTEGER
);

CREATE TABLE IF NOT EXISTS mata_kuliah (
    kode_mata_kuliah TEXT PRIMARY KEY,
    nama             TEXT,
    sks              INTEGER
);

CREATE TABLE IF NOT EXISTS kelas (
    id               INTEGER PRIMARY KEY,
    kode_mata_kuliah TEXT,
    nama_kelas       TEXT,
    dosen            TEXT,
    kapasitas        INTEGER
);

CREATE TABLE IF NOT EXISTS frs (
    id                INTEGER PRIMARY KEY,
    nrp               TEXT,
    semester          INTEGER NOT NULL,
    tanggal_disetujui TEXT
);

CREATE TABLE IF NOT EXISTS detail_frs (
    id       INTEGER PRIMARY KEY,
    frs_id   INTEGER NOT NULL,
    kelas_id INTEGER NOT NULL,
    action   TEXT,
    tanggal  TEXT
);

CREATE TABLE IF NOT EXISTS log_frs (
    id      INTEGER PRIMARY KEY,
    frs_id  INTEGER NOT NULL,
    status  TEXT,
    tanggal TEXT
);

CREATE TABLE IF NOT EXISTS nilai_mahasiswa (
    id       INTEGER PRIMARY KEY,
    nrp      TEXT,
    semester INTEGER NOT NULL,
    nilai    REAL
);

CREATE TABLE IF NOT EXISTS pembayaran (
    id            INTEGER PRIMARY KEY,
    nrp           TEXT,
    semester      INTEGER NOT NULL,
    tanggal_bayar TEXT
);

CREATE TABLE IF NOT EXISTS pembatalan_frs (
    id                INTEGER PRIMARY KEY,
    frs_id            INTEGER NOT NULL,
    tanggal_pengajuan TEXT
);
";
