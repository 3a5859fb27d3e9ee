//! Bearer-token authentication with python-jose and passlib.

use crudforge_schema::SqlSchema;

use crate::model::ACCOUNTS_TABLE;
use crate::pass::{GenerationContext, Pass};
use crate::python::base::render_config;
use crate::python::{add_requirement, render_requirements};
use crate::CodegenError;

/// Writes the `app.auth` package: the account model, credential schemas,
/// token helpers and the register/login router.
pub struct PythonAuthPass;

impl Pass for PythonAuthPass {
    fn name(&self) -> &'static str {
        "python-auth"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["python-data"]
    }

    fn run(&self, _schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        ctx.set_file("app/auth/__init__.py", "");
        ctx.set_file("app/auth/model.py", generate_model());
        ctx.set_file("app/auth/schemas.py", SCHEMAS_PY);
        ctx.set_file("app/auth/security.py", SECURITY_PY);
        ctx.set_file("app/auth/router.py", ROUTER_PY);
        ctx.set_metadata("has:auth", "true");
        render_config(ctx);

        add_requirement(ctx, "bcrypt", "==4.0.1");
        add_requirement(ctx, "passlib[bcrypt]", "==1.7.4");
        add_requirement(ctx, "python-jose[cryptography]", "==3.3.0");
        render_requirements(ctx);
        Ok(())
    }
}

fn generate_model() -> String {
    format!(
        r#"from datetime import datetime

from sqlalchemy import BigInteger, DateTime, Integer, String, func
from sqlalchemy.orm import Mapped, mapped_column

from app.database import Base


class Account(Base):
    __tablename__ = "{ACCOUNTS_TABLE}"

    id: Mapped[int] = mapped_column(BigInteger().with_variant(Integer, "sqlite"), primary_key=True)
    username: Mapped[str] = mapped_column(String(100), unique=True)
    password_hash: Mapped[str] = mapped_column(String(255))
    created_at: Mapped[datetime] = mapped_column(DateTime, server_default=func.now())
"#
    )
}

const SCHEMAS_PY: &str = r#"from pydantic import BaseModel, Field


class Credentials(BaseModel):
    username: str = Field(min_length=3, max_length=100)
    password: str = Field(min_length=8)


class Token(BaseModel):
    access_token: str
    token_type: str = "bearer"
    expires_in: int
"#;

const SECURITY_PY: &str = r#"from datetime import datetime, timedelta, timezone
from typing import Annotated, Optional

from fastapi import Depends, HTTPException, status
from fastapi.security import HTTPAuthorizationCredentials, HTTPBearer
from jose import JWTError, jwt
from passlib.context import CryptContext
from sqlalchemy.orm import Session

from app.auth.model import Account
from app.auth.schemas import Token
from app.config import Settings, get_settings
from app.database import get_db

ALGORITHM = "HS256"

passwords = CryptContext(schemes=["bcrypt"], deprecated="auto")
bearer = HTTPBearer(auto_error=False)


def hash_password(password: str) -> str:
    return passwords.hash(password)


def verify_password(password: str, password_hash: str) -> bool:
    return passwords.verify(password, password_hash)


def issue_token(account: Account, settings: Settings) -> Token:
    expires_in = settings.jwt_expire_minutes * 60
    claims = {
        "sub": str(account.id),
        "username": account.username,
        "exp": datetime.now(timezone.utc) + timedelta(seconds=expires_in),
    }
    token = jwt.encode(claims, settings.jwt_secret, algorithm=ALGORITHM)
    return Token(access_token=token, expires_in=expires_in)


def current_account(
    credentials: Annotated[Optional[HTTPAuthorizationCredentials], Depends(bearer)],
    settings: Annotated[Settings, Depends(get_settings)],
    db: Annotated[Session, Depends(get_db)],
) -> Account:
    unauthorized = HTTPException(
        status_code=status.HTTP_401_UNAUTHORIZED,
        detail="invalid or missing token",
        headers={"WWW-Authenticate": "Bearer"},
    )
    if credentials is None:
        raise unauthorized
    try:
        claims = jwt.decode(credentials.credentials, settings.jwt_secret, algorithms=[ALGORITHM])
        account_id = int(claims["sub"])
    except (JWTError, KeyError, ValueError):
        raise unauthorized from None
    account = db.get(Account, account_id)
    if account is None:
        raise unauthorized
    return account
"#;

const ROUTER_PY: &str = r#"from typing import Annotated

from fastapi import APIRouter, Depends, HTTPException, status
from sqlalchemy import select
from sqlalchemy.orm import Session

from app.auth.model import Account
from app.auth.schemas import Credentials, Token
from app.auth.security import hash_password, issue_token, verify_password
from app.config import Settings, get_settings
from app.database import get_db

router = APIRouter(prefix="/auth", tags=["auth"])

Db = Annotated[Session, Depends(get_db)]
AppSettings = Annotated[Settings, Depends(get_settings)]


@router.post("/register", response_model=Token, status_code=status.HTTP_201_CREATED)
def register(credentials: Credentials, db: Db, settings: AppSettings) -> Token:
    taken = db.scalar(select(Account.id).where(Account.username == credentials.username))
    if taken is not None:
        raise HTTPException(status_code=status.HTTP_409_CONFLICT, detail="username already taken")
    account = Account(
        username=credentials.username,
        password_hash=hash_password(credentials.password),
    )
    db.add(account)
    db.commit()
    db.refresh(account)
    return issue_token(account, settings)


@router.post("/login", response_model=Token)
def login(credentials: Credentials, db: Db, settings: AppSettings) -> Token:
    account = db.scalar(select(Account).where(Account.username == credentials.username))
    if account is None or not verify_password(credentials.password, account.password_hash):
        raise HTTPException(status_code=status.HTTP_401_UNAUTHORIZED, detail="invalid credentials")
    return issue_token(account, settings)
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_package() {
        let mut ctx = GenerationContext::new();
        PythonAuthPass.run(&SqlSchema::new(), &mut ctx).unwrap();

        assert!(ctx
            .get_file("app/auth/model.py")
            .unwrap()
            .contains("    __tablename__ = \"auth_accounts\"\n"));
        assert!(ctx
            .get_file("app/auth/security.py")
            .unwrap()
            .contains("def current_account("));
        assert!(ctx.get_file("app/config.py").unwrap().contains("    jwt_secret: str"));
        assert!(ctx
            .get_file("requirements.txt")
            .unwrap()
            .contains("python-jose[cryptography]==3.3.0\n"));
        assert!(ctx.has_metadata("has:auth"));
    }
}
