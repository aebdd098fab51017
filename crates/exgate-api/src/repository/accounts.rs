//! Binance 계정 Repository.
//!
//! 암호화된 계정 자격증명의 Single Source of Truth.
//! API 시크릿은 `CredentialVault`가 만든 `nonce:ciphertext:tag` 문자열로만
//! 저장되며, 복호화는 이 모듈의 헬퍼를 통해서만 수행합니다.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use exgate_core::{CredentialVault, CryptoError};
use exgate_exchange::Credentials;

/// 계정 테이블 스키마.
///
/// 마이그레이션 도구 없이 기동 시 1회 적용됩니다.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS binance_accounts (
    id               UUID PRIMARY KEY,
    label            TEXT NOT NULL UNIQUE,
    api_key          TEXT NOT NULL,
    api_secret_enc   TEXT NOT NULL,
    is_active        BOOLEAN NOT NULL DEFAULT TRUE,
    is_default       BOOLEAN NOT NULL DEFAULT FALSE,
    last_verified_at TIMESTAMPTZ,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at       TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// DB에서 조회한 계정 레코드.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub label: String,
    pub api_key: String,
    /// 암호화된 API 시크릿 (`base64url(nonce):base64url(ct):base64url(tag)`)
    pub api_secret_enc: String,
    pub is_active: bool,
    pub is_default: bool,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 신규 계정 입력값 (시크릿은 이미 암호화된 상태).
#[derive(Debug)]
pub struct NewAccount {
    pub label: String,
    pub api_key: String,
    pub api_secret_enc: String,
    pub is_active: bool,
    pub is_default: bool,
}

/// 계정 Repository.
pub struct AccountRepository;

impl AccountRepository {
    /// 계정 테이블 부트스트랩.
    pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(SCHEMA).execute(pool).await?;
        Ok(())
    }

    /// 전체 계정 목록 조회 (기본 계정 우선, 최신 순).
    pub async fn list(pool: &PgPool) -> Result<Vec<AccountRow>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM binance_accounts
            ORDER BY is_default DESC, created_at DESC
            "#,
        )
        .fetch_all(pool)
        .await
    }

    /// ID로 계정 조회.
    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<AccountRow>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM binance_accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// 기본 계정 조회.
    ///
    /// 명시적으로 기본으로 지정된 활성 계정이 우선이며, 없으면 가장 최근
    /// 활성 계정을 반환합니다.
    pub async fn find_default(pool: &PgPool) -> Result<Option<AccountRow>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM binance_accounts
            WHERE is_active = TRUE
            ORDER BY is_default DESC, created_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(pool)
        .await
    }

    /// 계정 등록.
    pub async fn insert(pool: &PgPool, account: &NewAccount) -> Result<AccountRow, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO binance_accounts
                (id, label, api_key, api_secret_enc, is_active, is_default)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&account.label)
        .bind(&account.api_key)
        .bind(&account.api_secret_enc)
        .bind(account.is_active)
        .bind(account.is_default)
        .fetch_one(pool)
        .await
    }

    /// 계정 수정 (핸들러에서 병합된 레코드 전체를 저장).
    pub async fn update(pool: &PgPool, row: &AccountRow) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE binance_accounts
            SET label = $1,
                api_key = $2,
                api_secret_enc = $3,
                is_active = $4,
                is_default = $5,
                updated_at = NOW()
            WHERE id = $6
            "#,
        )
        .bind(&row.label)
        .bind(&row.api_key)
        .bind(&row.api_secret_enc)
        .bind(row.is_active)
        .bind(row.is_default)
        .bind(row.id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// 계정 삭제. 삭제된 행이 있으면 true.
    ///
    /// 계정 삭제와 함께 암호화된 시크릿도 함께 소멸합니다.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM binance_accounts WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 검증 성공 시각 기록.
    pub async fn mark_verified(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE binance_accounts SET last_verified_at = NOW(), updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// 기본 계정 지정 시 다른 계정의 기본 플래그 해제.
    pub async fn clear_other_defaults(pool: &PgPool, keep: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE binance_accounts SET is_default = FALSE WHERE id <> $1")
            .bind(keep)
            .execute(pool)
            .await?;

        Ok(())
    }
}

/// 계정 레코드의 시크릿을 복호화하여 호출용 자격증명 생성.
///
/// 복호화 실패(변조, 잘못된 키, 손상된 저장값)는 그대로 전파되며
/// 부분적으로 성공하는 일은 없습니다.
pub fn decrypt_credentials(
    row: &AccountRow,
    vault: &CredentialVault,
) -> Result<Credentials, CryptoError> {
    let api_secret = vault.decrypt(&row.api_secret_enc)?;
    Ok(Credentials::new(row.api_key.clone(), api_secret))
}

/// UNIQUE 제약 위반 여부 (label 중복 감지용).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use exgate_core::generate_master_key;

    #[test]
    fn test_decrypt_credentials_roundtrip() {
        let vault = CredentialVault::new(&generate_master_key()).unwrap();
        let row = AccountRow {
            id: Uuid::new_v4(),
            label: "main".to_string(),
            api_key: "api-key".to_string(),
            api_secret_enc: vault.encrypt("api-secret").unwrap(),
            is_active: true,
            is_default: false,
            last_verified_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let creds = decrypt_credentials(&row, &vault).unwrap();

        assert_eq!(creds.api_key, "api-key");
        use secrecy::ExposeSecret;
        assert_eq!(creds.api_secret.expose_secret(), "api-secret");
    }

    #[test]
    fn test_decrypt_credentials_rejects_tampered_secret() {
        let vault = CredentialVault::new(&generate_master_key()).unwrap();
        let row = AccountRow {
            id: Uuid::new_v4(),
            label: "main".to_string(),
            api_key: "api-key".to_string(),
            api_secret_enc: "garbage-without-delimiters".to_string(),
            is_active: true,
            is_default: false,
            last_verified_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(matches!(
            decrypt_credentials(&row, &vault),
            Err(CryptoError::InvalidFormat)
        ));
    }
}
