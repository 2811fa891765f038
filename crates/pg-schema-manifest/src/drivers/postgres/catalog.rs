//! PostgreSQL catalog reader.
//!
//! Implements [`CatalogSource`] over `information_schema` and `pg_catalog`.
//! The pool is capped at one connection: a run holds a single session for
//! its whole duration and issues every query on it in sequence.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::Row;
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::core::catalog::{
    CatalogSource, ColumnRow, ForeignKeyRow, FunctionRow, IndexRow, ParameterRow,
};
use crate::core::manifest::DatabaseInfo;
use crate::drivers::common::tls::{self, SslMode};
use crate::error::{ManifestError, Result};

/// Catalog reader over a single pooled PostgreSQL connection.
pub struct PostgresCatalog {
    pool: Pool,
}

impl PostgresCatalog {
    /// Connect and verify the connection with a trivial query.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pg_config = config.pg_config()?;
        let ssl_mode = SslMode::parse(&config.ssl_mode)?;

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = match tls::connector(ssl_mode)? {
            Some(connector) => Manager::from_config(pg_config, connector, mgr_config),
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config)
            }
        };

        let pool = Pool::builder(mgr)
            .max_size(1)
            .build()
            .map_err(|e| ManifestError::pool(e, "creating PostgreSQL catalog pool"))?;

        let catalog = Self { pool };
        let client = catalog.client("testing catalog connection").await?;
        client.simple_query("SELECT 1").await?;

        info!("Connected to PostgreSQL: {}", config.display_target());
        Ok(catalog)
    }

    async fn client(&self, context: &str) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| ManifestError::pool(e, context))
    }

    async fn query(
        &self,
        context: &str,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<Vec<Row>> {
        let client = self.client(context).await?;
        Ok(client.query(sql, params).await?)
    }

    async fn names(&self, context: &str, sql: &str, schema: &str) -> Result<Vec<String>> {
        let rows = self.query(context, sql, &[&schema]).await?;
        rows.iter()
            .map(|row| Ok(row.try_get::<_, String>(0)?))
            .collect()
    }

    /// Round-trip latency of a trivial query.
    pub async fn ping(&self) -> Result<Duration> {
        let client = self.client("health check").await?;
        let start = Instant::now();
        client.simple_query("SELECT 1").await?;
        Ok(start.elapsed())
    }
}

fn decode_column(row: &Row) -> Result<ColumnRow> {
    Ok(ColumnRow {
        name: row.try_get(0)?,
        data_type: row.try_get(1)?,
        udt_name: row.try_get(2)?,
        is_nullable: row.try_get(3)?,
        default: row.try_get(4)?,
        max_length: row.try_get(5)?,
        precision: row.try_get(6)?,
        scale: row.try_get(7)?,
        ordinal_position: row.try_get(8)?,
    })
}

fn decode_index(row: &Row) -> Result<IndexRow> {
    Ok(IndexRow {
        index_name: row.try_get(0)?,
        column_name: row.try_get(1)?,
        is_unique: row.try_get(2)?,
    })
}

fn decode_foreign_key(row: &Row) -> Result<ForeignKeyRow> {
    Ok(ForeignKeyRow {
        constraint_name: row.try_get(0)?,
        column_name: row.try_get(1)?,
        ref_schema: row.try_get(2)?,
        ref_table: row.try_get(3)?,
        ref_column: row.try_get(4)?,
    })
}

fn decode_function(row: &Row) -> Result<FunctionRow> {
    Ok(FunctionRow {
        specific_name: row.try_get(0)?,
        return_type: row.try_get(1)?,
        definition: row.try_get(2)?,
    })
}

fn decode_parameter(row: &Row) -> Result<ParameterRow> {
    Ok(ParameterRow {
        name: row.try_get(0)?,
        data_type: row.try_get(1)?,
        mode: row.try_get(2)?,
        ordinal_position: row.try_get(3)?,
    })
}

#[async_trait]
impl CatalogSource for PostgresCatalog {
    async fn database_info(&self) -> Result<DatabaseInfo> {
        let client = self.client("loading database identity").await?;
        let row = client
            .query_one(
                "SELECT version(), current_database()::text, current_user::text",
                &[],
            )
            .await?;
        Ok(DatabaseInfo {
            version: row.try_get(0)?,
            name: row.try_get(1)?,
            user: row.try_get(2)?,
        })
    }

    async fn schema_names(&self) -> Result<Vec<String>> {
        let query = r#"
            SELECT schema_name::text
            FROM information_schema.schemata
            WHERE schema_name NOT IN ('pg_catalog', 'information_schema', 'pg_toast')
              AND schema_name NOT LIKE 'pg\_temp\_%'
              AND schema_name NOT LIKE 'pg\_toast\_temp\_%'
            ORDER BY schema_name
        "#;
        let rows = self.query("listing schemas", query, &[]).await?;
        rows.iter()
            .map(|row| Ok(row.try_get::<_, String>(0)?))
            .collect()
    }

    async fn table_names(&self, schema: &str) -> Result<Vec<String>> {
        let query = r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = $1
              AND table_type = 'BASE TABLE'
            ORDER BY table_name
        "#;
        self.names("listing tables", query, schema).await
    }

    async fn view_names(&self, schema: &str) -> Result<Vec<String>> {
        let query = r#"
            SELECT table_name::text
            FROM information_schema.views
            WHERE table_schema = $1
            ORDER BY table_name
        "#;
        self.names("listing views", query, schema).await
    }

    async fn function_names(&self, schema: &str) -> Result<Vec<String>> {
        let query = r#"
            SELECT DISTINCT routine_name::text
            FROM information_schema.routines
            WHERE routine_schema = $1
              AND routine_type = 'FUNCTION'
            ORDER BY 1
        "#;
        self.names("listing functions", query, schema).await
    }

    async fn columns(&self, schema: &str, relation: &str) -> Result<Vec<ColumnRow>> {
        let query = r#"
            SELECT
                column_name::text,
                data_type::text,
                udt_name::text,
                is_nullable = 'YES',
                column_default::text,
                character_maximum_length::int4,
                numeric_precision::int4,
                numeric_scale::int4,
                ordinal_position::int4
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
        "#;
        let rows = self
            .query("loading columns", query, &[&schema, &relation])
            .await?;
        let columns = rows.iter().map(decode_column).collect::<Result<Vec<_>>>()?;
        debug!("Loaded {} columns for {}.{}", columns.len(), schema, relation);
        Ok(columns)
    }

    async fn primary_key(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        let query = r#"
            SELECT a.attname::text
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid
            WHERE n.nspname = $1
              AND t.relname = $2
              AND c.contype = 'p'
              AND a.attnum = ANY(c.conkey)
            ORDER BY array_position(c.conkey, a.attnum)
        "#;
        let rows = self
            .query("loading primary key", query, &[&schema, &table])
            .await?;
        rows.iter()
            .map(|row| Ok(row.try_get::<_, String>(0)?))
            .collect()
    }

    async fn index_rows(&self, schema: &str, table: &str) -> Result<Vec<IndexRow>> {
        // One row per indexed column; expression columns (attnum 0) are skipped.
        let query = r#"
            SELECT
                i.relname::text AS index_name,
                a.attname::text AS column_name,
                ix.indisunique
            FROM pg_catalog.pg_index ix
            JOIN pg_catalog.pg_class i ON i.oid = ix.indexrelid
            JOIN pg_catalog.pg_class t ON t.oid = ix.indrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
            WHERE n.nspname = $1
              AND t.relname = $2
            ORDER BY i.relname, array_position(ix.indkey::int2[], a.attnum)
        "#;
        let rows = self
            .query("loading indexes", query, &[&schema, &table])
            .await?;
        rows.iter().map(decode_index).collect()
    }

    async fn foreign_keys(&self, schema: &str, table: &str) -> Result<Vec<ForeignKeyRow>> {
        let query = r#"
            SELECT
                c.conname::text,
                a.attname::text,
                rn.nspname::text,
                rt.relname::text,
                ra.attname::text
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_class rt ON rt.oid = c.confrelid
            JOIN pg_catalog.pg_namespace rn ON rn.oid = rt.relnamespace
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = c.conkey[1]
            JOIN pg_catalog.pg_attribute ra ON ra.attrelid = rt.oid AND ra.attnum = c.confkey[1]
            WHERE n.nspname = $1
              AND t.relname = $2
              AND c.contype = 'f'
              AND array_length(c.conkey, 1) = 1
            ORDER BY c.conname
        "#;
        let rows = self
            .query("loading foreign keys", query, &[&schema, &table])
            .await?;
        rows.iter().map(decode_foreign_key).collect()
    }

    async fn view_definition(&self, schema: &str, view: &str) -> Result<Option<String>> {
        let query = r#"
            SELECT view_definition::text
            FROM information_schema.views
            WHERE table_schema = $1 AND table_name = $2
        "#;
        let rows = self
            .query("loading view definition", query, &[&schema, &view])
            .await?;
        match rows.first() {
            Some(row) => Ok(row.try_get::<_, Option<String>>(0)?),
            None => Ok(None),
        }
    }

    async fn function_detail(&self, schema: &str, function: &str) -> Result<Option<FunctionRow>> {
        let query = r#"
            SELECT
                specific_name::text,
                COALESCE(data_type, 'void')::text,
                routine_definition::text
            FROM information_schema.routines
            WHERE routine_schema = $1
              AND routine_name = $2
              AND routine_type = 'FUNCTION'
            ORDER BY specific_name
            LIMIT 1
        "#;
        let rows = self
            .query("loading function", query, &[&schema, &function])
            .await?;
        rows.first().map(decode_function).transpose()
    }

    async fn function_parameters(
        &self,
        schema: &str,
        specific_name: &str,
    ) -> Result<Vec<ParameterRow>> {
        let query = r#"
            SELECT
                COALESCE(parameter_name, '')::text,
                data_type::text,
                COALESCE(parameter_mode, 'IN')::text,
                ordinal_position::int4
            FROM information_schema.parameters
            WHERE specific_schema = $1 AND specific_name = $2
            ORDER BY ordinal_position
        "#;
        let rows = self
            .query("loading function parameters", query, &[&schema, &specific_name])
            .await?;
        rows.iter().map(decode_parameter).collect()
    }

    async fn close(&self) {
        self.pool.close();
        debug!("Closed PostgreSQL catalog pool");
    }
}
