//! Database session
//!
//! A [`Session`] owns one open database: the current tree, the key derived
//! from the passphrase, the dirty flag and the undo history. It is the only
//! writer of its tree.
//!
//! # Concurrency
//!
//! Readers take an `Arc<Tree>` snapshot under a short read lock and never
//! block writers for longer than that. Mutations run under the writer mutex:
//! the engine edits a private copy of the tree, and only a successful result
//! is swapped in. A reader holding an older snapshot keeps seeing that
//! snapshot in full. `apply` waits for the writer, `try_apply` fails with
//! [`CofferError::SessionBusy`] instead.

mod undo;

pub use undo::UndoLog;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::audit::{AuditEntry, AuditLogger, AuditOperation};
use crate::config::SessionConfig;
use crate::crypto::{derive_key, DerivedKey, KeyDerivationParams, SecureString};
use crate::error::{CofferError, CofferResult};
use crate::models::{FieldValue, Node, NodeId, Tree};
use crate::services::editor::{is_valid_group_name, NameValidation};
use crate::services::mutation::{ChangeRecord, DeletePolicy, MutationEngine, Operation};
use crate::storage::{BackupManager, DatabaseFile};

/// State only the writer may touch
struct Writer {
    key: DerivedKey,
    kdf: KeyDerivationParams,
    undo: UndoLog,
}

/// An open database
pub struct Session {
    path: PathBuf,
    config: SessionConfig,
    tree: RwLock<Arc<Tree>>,
    writer: Mutex<Writer>,
    dirty: AtomicBool,
    audit: Option<AuditLogger>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("path", &self.path)
            .field("dirty", &self.is_dirty())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a new database at `path` and write it immediately
    ///
    /// Fails if a file already exists there.
    pub fn create(path: impl AsRef<Path>, passphrase: SecureString, config: SessionConfig) -> CofferResult<Self> {
        let path = path.as_ref().to_path_buf();
        if config.read_only {
            return Err(CofferError::ReadOnly);
        }
        if path.exists() {
            return Err(CofferError::Storage(format!(
                "{} already exists",
                path.display()
            )));
        }
        check_passphrase(&passphrase, &config)?;

        let kdf = config.kdf.params();
        let key = derive_key(&passphrase, &kdf)?;
        let root_title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Root".to_string());

        let tree = Tree::new(root_title);
        DatabaseFile::seal(&tree, &key, &kdf)?.write(&path)?;
        let session = Self::assemble(path, config, tree, key, kdf);
        info!(path = %session.path.display(), "Created database");
        Ok(session)
    }

    /// Open an existing database
    ///
    /// A wrong passphrase fails with an encryption error.
    pub fn open(path: impl AsRef<Path>, passphrase: SecureString, config: SessionConfig) -> CofferResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = DatabaseFile::read(&path)?;
        let key = derive_key(&passphrase, &file.kdf)?;
        let tree = file.open(&key)?;
        info!(path = %path.display(), nodes = tree.len(), "Opened database");
        Ok(Self::assemble(path, config, tree, key, file.kdf))
    }

    fn assemble(path: PathBuf, config: SessionConfig, tree: Tree, key: DerivedKey, kdf: KeyDerivationParams) -> Self {
        let audit = config.audit_log.clone().map(AuditLogger::new);
        let undo = UndoLog::new(config.undo_limit);
        Self {
            path,
            config,
            tree: RwLock::new(Arc::new(tree)),
            writer: Mutex::new(Writer { key, kdf, undo }),
            dirty: AtomicBool::new(false),
            audit,
        }
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether there are changes not yet saved
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Number of operations `undo_last` can revert
    pub fn undo_depth(&self) -> usize {
        self.lock_writer().undo.len()
    }

    // === Reads ===

    /// The current tree; later mutations never change it
    pub fn snapshot(&self) -> Arc<Tree> {
        let guard = self.tree.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Children of a group in stored order
    pub fn children_of(&self, group: NodeId) -> CofferResult<Vec<Node>> {
        let tree = self.snapshot();
        Ok(tree.children_of(group)?.into_iter().cloned().collect())
    }

    /// Children of a group in the configured display order
    pub fn children_sorted(&self, group: NodeId) -> CofferResult<Vec<Node>> {
        let tree = self.snapshot();
        Ok(tree
            .children_sorted(group, &self.config.sort)?
            .into_iter()
            .cloned()
            .collect())
    }

    /// Ancestors of a node, nearest first, ending with the root
    pub fn ancestors_of(&self, node: NodeId) -> CofferResult<Vec<NodeId>> {
        self.snapshot().ancestors_of(node)
    }

    /// Check a group name against the siblings it would have
    pub fn is_valid_group_name(&self, parent: NodeId, name: &str, editing: Option<NodeId>) -> NameValidation {
        is_valid_group_name(&self.snapshot(), Some(parent), name, editing)
    }

    /// Run `f` over the plaintext of one field
    ///
    /// Protected values are only unmasked for the duration of the call.
    pub fn with_protected_field<R>(
        &self,
        entry: NodeId,
        field: &str,
        f: impl FnOnce(&[u8]) -> R,
    ) -> CofferResult<R> {
        let tree = self.snapshot();
        let value = field_value(&tree, entry, field)?;
        debug!(entry = %entry, field, "Scoped field access");
        match value {
            FieldValue::Plain(text) => Ok(f(text.as_bytes())),
            FieldValue::Protected(secret) => secret.with_plaintext(f),
        }
    }

    /// Copy a field out of the session, e.g. for a clipboard
    ///
    /// Protected fields leave only when the copy policy allows it.
    pub fn copy_protected_field(&self, entry: NodeId, field: &str) -> CofferResult<Zeroizing<String>> {
        let tree = self.snapshot();
        match field_value(&tree, entry, field)? {
            FieldValue::Plain(text) => Ok(Zeroizing::new(text.clone())),
            FieldValue::Protected(_) if !self.config.allow_copy_protected_fields => {
                Err(CofferError::CopyNotAllowed)
            }
            FieldValue::Protected(secret) => secret.reveal(),
        }
    }

    // === Writes ===

    /// Apply an operation, waiting for any other writer
    pub fn apply(&self, operation: Operation) -> CofferResult<ChangeRecord> {
        let mut writer = self.lock_writer();
        self.apply_locked(&mut writer, operation)
    }

    /// Apply an operation unless another writer holds the session
    pub fn try_apply(&self, operation: Operation) -> CofferResult<ChangeRecord> {
        let mut writer = match self.writer.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return Err(CofferError::SessionBusy),
        };
        self.apply_locked(&mut writer, operation)
    }

    fn apply_locked(&self, writer: &mut Writer, operation: Operation) -> CofferResult<ChangeRecord> {
        if self.config.read_only {
            return Err(CofferError::ReadOnly);
        }
        let hard_delete = matches!(
            operation,
            Operation::Delete {
                policy: DeletePolicy::HardDelete,
                ..
            }
        );

        let current = self.snapshot();
        let mut next = Tree::clone(&current);
        let record = MutationEngine::new(&self.config).apply(&mut next, operation)?;
        self.publish(next);

        // Released secrets are gone from every older tree too
        if hard_delete {
            writer.undo.clear();
        } else {
            writer.undo.push(current);
        }
        self.dirty.store(true, Ordering::SeqCst);
        self.audit(AuditEntry::from_change(&record));
        info!(action = ?record.action, node = %record.node, "Committed change");
        Ok(record)
    }

    /// Revert the last successful operation; `false` when there is none
    pub fn undo_last(&self) -> CofferResult<bool> {
        if self.config.read_only {
            return Err(CofferError::ReadOnly);
        }
        let mut writer = self.lock_writer();
        let Some(previous) = writer.undo.pop() else {
            return Ok(false);
        };
        *self.tree.write().unwrap_or_else(PoisonError::into_inner) = previous;
        self.dirty.store(true, Ordering::SeqCst);
        self.audit(AuditEntry::database(AuditOperation::Undo, self.path.display().to_string()));
        info!(remaining = writer.undo.len(), "Undid last change");
        Ok(true)
    }

    /// Encrypt the current tree and write it atomically
    ///
    /// On failure the file on disk is untouched and the session stays dirty.
    pub fn save(&self) -> CofferResult<()> {
        if self.config.read_only {
            return Err(CofferError::ReadOnly);
        }
        let writer = self.lock_writer();
        self.write_file(&writer.key, &writer.kdf)?;
        self.dirty.store(false, Ordering::SeqCst);
        info!(path = %self.path.display(), "Saved database");
        Ok(())
    }

    /// Save on a background thread; later mutations queue behind it
    pub fn save_in_background(self: Arc<Self>) -> JoinHandle<CofferResult<()>> {
        thread::spawn(move || self.save())
    }

    /// Re-key the database with a new passphrase and save it
    ///
    /// The session keeps its old key if writing fails.
    pub fn change_passphrase(&self, passphrase: SecureString) -> CofferResult<()> {
        if self.config.read_only {
            return Err(CofferError::ReadOnly);
        }
        check_passphrase(&passphrase, &self.config)?;

        let mut writer = self.lock_writer();
        let kdf = writer.kdf.resalted();
        let key = derive_key(&passphrase, &kdf)?;
        self.write_file(&key, &kdf)?;

        writer.key = key;
        writer.kdf = kdf;
        self.dirty.store(false, Ordering::SeqCst);
        self.audit(AuditEntry::database(AuditOperation::Rekey, self.path.display().to_string()));
        info!(path = %self.path.display(), "Changed passphrase");
        Ok(())
    }

    fn write_file(&self, key: &DerivedKey, kdf: &KeyDerivationParams) -> CofferResult<()> {
        let file = DatabaseFile::seal(&self.snapshot(), key, kdf)?;
        self.backup_existing();
        file.write(&self.path)
    }

    fn backup_existing(&self) {
        if self.config.omit_backup || !self.path.exists() {
            return;
        }
        let Some(dir) = &self.config.backup_dir else {
            return;
        };
        let manager = BackupManager::new(dir.clone(), &self.path, self.config.backup_retention);
        if let Err(e) = manager.create_backup_with_retention(&self.path) {
            warn!(error = %e, "Backup failed; saving anyway");
        }
    }

    fn publish(&self, tree: Tree) {
        *self.tree.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(tree);
    }

    fn audit(&self, entry: AuditEntry) {
        if let Some(logger) = &self.audit {
            if let Err(e) = logger.log(&entry) {
                warn!(error = %e, "Failed to write audit entry");
            }
        }
    }

    fn lock_writer(&self) -> MutexGuard<'_, Writer> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn check_passphrase(passphrase: &SecureString, config: &SessionConfig) -> CofferResult<()> {
    if passphrase.is_empty() && !config.empty_password_allowed {
        return Err(CofferError::Validation("Passphrase cannot be empty".into()));
    }
    Ok(())
}

fn field_value<'t>(tree: &'t Tree, entry: NodeId, field: &str) -> CofferResult<&'t FieldValue> {
    tree.entry(entry)
        .ok_or_else(|| CofferError::entry_not_found(entry.to_string()))?
        .field(field)
        .ok_or_else(|| CofferError::field_not_found(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::session::test_config;
    use crate::models::{EntryInfo, GroupInfo, PASSWORD_FIELD};
    use crate::storage::file_io::temp_path_for;
    use std::sync::mpsc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_test_session(config: SessionConfig) -> (TempDir, Session) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vault.cdb");
        let session = Session::create(&path, SecureString::from("pw"), config).unwrap();
        (temp_dir, session)
    }

    fn add_group(session: &Session, parent: NodeId, title: &str) -> NodeId {
        session
            .apply(Operation::CreateGroup {
                parent,
                info: GroupInfo::new(title),
            })
            .unwrap()
            .node
    }

    fn add_login(session: &Session, parent: NodeId, title: &str, password: &str) -> NodeId {
        let info = EntryInfo::new(title)
            .with_field("UserName", FieldValue::plain("alice"))
            .with_field(PASSWORD_FIELD, FieldValue::plain(password));
        session
            .apply(Operation::CreateEntry { parent, info })
            .unwrap()
            .node
    }

    #[test]
    fn test_create_then_open() {
        let (_temp, session) = create_test_session(test_config());
        assert!(!session.is_dirty());
        assert!(session.path().exists());
        assert_eq!(session.snapshot().root().base.title, "vault");

        let reopened = Session::open(session.path(), SecureString::from("pw"), test_config()).unwrap();
        assert_eq!(*reopened.snapshot(), *session.snapshot());
    }

    #[test]
    fn test_create_refuses_existing_file_and_empty_passphrase() {
        let (temp, session) = create_test_session(test_config());
        let err = Session::create(session.path(), SecureString::from("pw"), test_config()).unwrap_err();
        assert!(matches!(err, CofferError::Storage(_)));

        let other = temp.path().join("other.cdb");
        let err = Session::create(&other, SecureString::from(""), test_config()).unwrap_err();
        assert!(err.is_validation());

        let mut config = test_config();
        config.empty_password_allowed = true;
        Session::create(&other, SecureString::from(""), config).unwrap();
    }

    #[test]
    fn test_save_load_round_trip() {
        let (_temp, session) = create_test_session(test_config());
        let root = session.snapshot().root_id();
        let work = add_group(&session, root, "Work");
        let email = add_login(&session, work, "Email", "x");
        add_login(&session, root, "Bank", "y");
        session
            .apply(Operation::UpdateEntry {
                id: email,
                info: EntryInfo::new("Email2").with_field(PASSWORD_FIELD, FieldValue::plain("z")),
            })
            .unwrap();
        let junk = add_group(&session, root, "Junk");
        session
            .apply(Operation::Delete {
                node: junk,
                policy: DeletePolicy::SoftDelete,
            })
            .unwrap();
        assert!(session.is_dirty());

        session.save().unwrap();
        assert!(!session.is_dirty());

        let reopened = Session::open(session.path(), SecureString::from("pw"), test_config()).unwrap();
        let tree = reopened.snapshot();
        assert_eq!(*tree, *session.snapshot());

        let order: Vec<_> = tree.children_of(root).unwrap().iter().map(|n| n.title().to_string()).collect();
        assert_eq!(order, vec!["Work", "Bank", "Recycle Bin"]);
        let entry = tree.entry(email).unwrap();
        assert_eq!(entry.history.len(), 1);
        let password = reopened
            .with_protected_field(email, PASSWORD_FIELD, |b| b.to_vec())
            .unwrap();
        assert_eq!(password, b"z");
    }

    #[test]
    fn test_wrong_passphrase() {
        let (_temp, session) = create_test_session(test_config());
        let err = Session::open(session.path(), SecureString::from("nope"), test_config()).unwrap_err();
        assert!(matches!(err, CofferError::Encryption(_)));
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_commits() {
        let (_temp, session) = create_test_session(test_config());
        let root = session.snapshot().root_id();
        let before = session.snapshot();

        add_group(&session, root, "Work");

        assert_eq!(before.len(), 1);
        assert_eq!(session.snapshot().len(), 2);
        assert_eq!(session.children_of(root).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_operation_changes_nothing() {
        let (_temp, session) = create_test_session(test_config());
        let root = session.snapshot().root_id();
        let before = session.snapshot();

        let err = session
            .apply(Operation::Reparent {
                node: root,
                new_parent: root,
            })
            .unwrap_err();
        assert!(matches!(err, CofferError::Structure(_)));
        assert!(Arc::ptr_eq(&before, &session.snapshot()));
        assert!(!session.is_dirty());
        assert_eq!(session.undo_depth(), 0);
    }

    #[test]
    fn test_try_apply_when_busy() {
        let (_temp, session) = create_test_session(test_config());
        let session = Arc::new(session);
        let root = session.snapshot().root_id();

        let guard = session.lock_writer();
        let err = session
            .try_apply(Operation::CreateGroup {
                parent: root,
                info: GroupInfo::new("Busy"),
            })
            .unwrap_err();
        assert!(matches!(err, CofferError::SessionBusy));

        // A blocking apply waits for the writer instead
        let (done_tx, done_rx) = mpsc::channel();
        let waiter = {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                let result = session.apply(Operation::CreateGroup {
                    parent: root,
                    info: GroupInfo::new("Queued"),
                });
                done_tx.send(()).unwrap();
                result
            })
        };
        assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(guard);
        waiter.join().unwrap().unwrap();
        assert_eq!(session.children_of(root).unwrap().len(), 1);
    }

    #[test]
    fn test_undo() {
        let (_temp, session) = create_test_session(test_config());
        let root = session.snapshot().root_id();
        let work = add_group(&session, root, "Work");
        session
            .apply(Operation::UpdateGroup {
                id: work,
                info: GroupInfo::new("Work2"),
            })
            .unwrap();

        assert!(session.undo_last().unwrap());
        assert_eq!(session.snapshot().group(work).unwrap().base.title, "Work");
        assert!(session.undo_last().unwrap());
        assert!(!session.snapshot().contains(work));
        assert!(!session.undo_last().unwrap());
    }

    #[test]
    fn test_undo_limit_and_hard_delete() {
        let mut config = test_config();
        config.undo_limit = 2;
        let (_temp, session) = create_test_session(config);
        let root = session.snapshot().root_id();
        for i in 0..4 {
            add_group(&session, root, &format!("g{}", i));
        }
        assert_eq!(session.undo_depth(), 2);

        let doomed = add_login(&session, root, "Doomed", "pw");
        session
            .apply(Operation::Delete {
                node: doomed,
                policy: DeletePolicy::HardDelete,
            })
            .unwrap();
        assert_eq!(session.undo_depth(), 0);
    }

    #[test]
    fn test_failed_save_stays_dirty() {
        let (_temp, session) = create_test_session(test_config());
        let root = session.snapshot().root_id();
        add_group(&session, root, "Work");

        let blocker = temp_path_for(session.path());
        std::fs::create_dir(&blocker).unwrap();
        assert!(session.save().is_err());
        assert!(session.is_dirty());

        let on_disk = Session::open(session.path(), SecureString::from("pw"), test_config()).unwrap();
        assert_eq!(on_disk.snapshot().len(), 1);

        std::fs::remove_dir(&blocker).unwrap();
        session.save().unwrap();
        assert!(!session.is_dirty());
    }

    #[test]
    fn test_save_in_background() {
        let (_temp, session) = create_test_session(test_config());
        let session = Arc::new(session);
        let root = session.snapshot().root_id();
        add_group(&session, root, "Before");

        let handle = Arc::clone(&session).save_in_background();
        add_group(&session, root, "During");
        handle.join().unwrap().unwrap();

        session.save().unwrap();
        let reopened = Session::open(session.path(), SecureString::from("pw"), test_config()).unwrap();
        assert_eq!(reopened.snapshot().len(), 3);
    }

    #[test]
    fn test_read_only() {
        let (_temp, session) = create_test_session(test_config());
        let mut config = test_config();
        config.read_only = true;
        let session = Session::open(session.path(), SecureString::from("pw"), config).unwrap();
        let root = session.snapshot().root_id();

        let err = session
            .apply(Operation::CreateGroup {
                parent: root,
                info: GroupInfo::new("Nope"),
            })
            .unwrap_err();
        assert!(matches!(err, CofferError::ReadOnly));
        assert!(matches!(session.save(), Err(CofferError::ReadOnly)));
        assert!(matches!(session.undo_last(), Err(CofferError::ReadOnly)));
    }

    #[test]
    fn test_copy_policy() {
        let (_temp, session) = create_test_session(test_config());
        let root = session.snapshot().root_id();
        let email = add_login(&session, root, "Email", "s3cret");

        assert_eq!(
            session.copy_protected_field(email, "UserName").unwrap().as_str(),
            "alice"
        );
        let err = session.copy_protected_field(email, PASSWORD_FIELD).unwrap_err();
        assert!(matches!(err, CofferError::CopyNotAllowed));
        assert!(session.copy_protected_field(email, "Missing").unwrap_err().is_not_found());

        let mut config = test_config();
        config.allow_copy_protected_fields = true;
        session.save().unwrap();
        let permissive = Session::open(session.path(), SecureString::from("pw"), config).unwrap();
        assert_eq!(
            permissive.copy_protected_field(email, PASSWORD_FIELD).unwrap().as_str(),
            "s3cret"
        );
    }

    #[test]
    fn test_change_passphrase() {
        let (_temp, session) = create_test_session(test_config());
        let root = session.snapshot().root_id();
        add_login(&session, root, "Email", "s3cret");

        session.change_passphrase(SecureString::from("new")).unwrap();
        assert!(!session.is_dirty());

        assert!(Session::open(session.path(), SecureString::from("pw"), test_config()).is_err());
        let reopened = Session::open(session.path(), SecureString::from("new"), test_config()).unwrap();
        assert_eq!(reopened.snapshot().len(), 2);
    }

    #[test]
    fn test_audit_and_backups() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config();
        config.audit_log = Some(temp_dir.path().join("audit.log"));
        config.backup_dir = Some(temp_dir.path().join("backups"));
        config.backup_retention = 2;
        let path = temp_dir.path().join("vault.cdb");
        let session = Session::create(&path, SecureString::from("pw"), config).unwrap();
        let root = session.snapshot().root_id();

        let work = add_group(&session, root, "Work");
        session.undo_last().unwrap();
        for _ in 0..3 {
            session.save().unwrap();
            thread::sleep(Duration::from_millis(2));
        }

        let entries = AuditLogger::new(temp_dir.path().join("audit.log")).read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].operation, AuditOperation::Create);
        assert_eq!(entries[0].entity_id, work.to_string());
        assert_eq!(entries[1].operation, AuditOperation::Undo);

        let backups = BackupManager::new(temp_dir.path().join("backups"), &path, 2)
            .list_backups()
            .unwrap();
        assert_eq!(backups.len(), 2);
    }

    #[test]
    fn test_group_name_validation() {
        let (_temp, session) = create_test_session(test_config());
        let root = session.snapshot().root_id();
        add_group(&session, root, "Work");
        assert!(session.is_valid_group_name(root, "work", None).is_error);
        assert!(!session.is_valid_group_name(root, "Home", None).is_error);
    }
}
