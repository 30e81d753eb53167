//! Handlers for every request the name server answers: namespace,
//! membership, ACL and access-request bookkeeping, and the routing lookups
//! that point a client at the right storage server.

use std::net::SocketAddr;

use crate::error::NsError;
use crate::ns::ss_link;
use crate::ns::state::{Access, FileRecord, SsId};
use crate::ns::{Existence, NameServer, MAX_ACL_ENTRIES, MAX_PENDING_REQUESTS, RECENTS_LIMIT};
use crate::wire::{ErrorCode, OpCode, Record};

type Result<T> = std::result::Result<T, NsError>;

/// View filters (`-a`, `-l`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewFlags {
    pub all: bool,
    pub long: bool,
}

impl NameServer {
    /// Opens a short, bounded connection to a storage server's *control*
    /// endpoint and issues READ as a liveness/existence probe, refreshing
    /// `char_count`/`word_count` opportunistically on success.
    pub async fn ss_file_exists(&self, file: &FileRecord) -> Existence {
        if let Some(existence) = self.probe(file.primary.ss_id, &file.filename).await {
            if !matches!(existence, Existence::Unknown) {
                return existence;
            }
        }
        if let Some(replica) = file.replica {
            if let Some(existence) = self.probe(replica.ss_id, &file.filename).await {
                return existence;
            }
        }
        Existence::Unknown
    }

    async fn probe(&self, ss_id: SsId, filename: &str) -> Option<Existence> {
        let ss = self.ss_roster.get(&ss_id)?.control_addr();
        let request = Record::request(OpCode::Read, "NM", filename);
        let reply = ss_link::call(ss, &request, self.probe_timeout()).await;
        Some(match reply {
            None => Existence::Unknown,
            Some(r) if r.error_code == ErrorCode::Success => {
                let char_count = r.data.chars().count() as u64;
                let word_count = r.data.split_whitespace().count() as u64;
                let size = r.data.len() as u64;
                Existence::Exists { word_count, char_count, size }
            }
            Some(r) if r.error_code == ErrorCode::FileNotFound => Existence::Stale,
            Some(_) => Existence::Unknown,
        })
    }

    fn ss_client_addr(&self, ss_id: SsId) -> Option<SocketAddr> {
        self.ss_roster.get(&ss_id).map(|s| s.client_addr())
    }

    fn is_active(&self, ss_id: SsId) -> bool {
        self.ss_roster.get(&ss_id).map(|s| s.active).unwrap_or(false)
    }

    /// VIEW: failure-aware listing with stale-entry purge.
    pub async fn view(&self, user: &str, flags: ViewFlags) -> String {
        let snapshot: Vec<FileRecord> = self.files.iter().map(|e| e.value().clone()).collect();
        let mut visible = Vec::new();
        let mut stale = Vec::new();

        for mut file in snapshot {
            match self.ss_file_exists(&file).await {
                Existence::Stale => {
                    stale.push(file.filename.clone());
                    continue;
                }
                Existence::Unknown => continue,
                Existence::Exists { word_count, char_count, size } => {
                    file.word_count = word_count;
                    file.char_count = char_count;
                    file.size = size;
                }
            }

            let primary_active = self.is_active(file.primary.ss_id);
            let replica_active = file.replica.map(|r| self.is_active(r.ss_id)).unwrap_or(false);
            if !primary_active && !replica_active {
                continue;
            }

            if !flags.all && !file.can_read(user) && file.owner != user {
                continue;
            }

            visible.push(file);
        }

        for filename in stale {
            self.purge(&filename);
        }

        format_listing(&visible, flags.long)
    }

    /// CREATE: probe SSes round-robin, adopt the first that succeeds as
    /// primary, set a replica if a second active SS exists.
    pub async fn create(&self, username: &str, filename: &str) -> Result<()> {
        if self.files.contains_key(filename) {
            return Err(NsError::FileExists);
        }

        let active = self.active_ss_ordered();
        if active.is_empty() {
            return Err(NsError::SsNotFound);
        }

        let start = self.files.len() % active.len();
        let mut last_err = NsError::ConnectionFailed;
        for offset in 0..active.len() {
            let candidate = &active[(start + offset) % active.len()];
            let request = Record::request(OpCode::Create, username, filename);
            match ss_link::call(candidate.control_addr(), &request, self.dial_timeout()).await {
                Some(r) if r.error_code == ErrorCode::Success => {
                    let replica = self.next_active_after(candidate.ss_id);
                    let record = FileRecord::new(
                        filename.to_string(),
                        username.to_string(),
                        candidate.endpoint(),
                        replica,
                    );
                    self.files.insert(filename.to_string(), record);
                    self.trie.lock().unwrap().insert(filename);
                    if let Some(mut ss) = self.ss_roster.get_mut(&candidate.ss_id) {
                        ss.claimed_files.insert(filename.to_string());
                    }
                    if let Some(r) = replica {
                        if let Some(mut ss) = self.ss_roster.get_mut(&r.ss_id) {
                            ss.claimed_files.insert(filename.to_string());
                        }
                    }
                    self.persist();
                    tracing::info!(filename, username, op = "create", "file created");
                    return Ok(());
                }
                Some(r) => last_err = translate_ss_error(r.error_code, r.error_msg),
                None => last_err = NsError::ConnectionFailed,
            }
        }
        tracing::warn!(filename, username, op = "create", error = ?last_err, "create failed");
        Err(last_err)
    }

    /// DELETE: owner-only, metadata mutated only after SS confirms.
    pub async fn delete(&self, username: &str, filename: &str) -> Result<()> {
        let file = self.files.get(filename).ok_or(NsError::FileNotFound)?.clone();
        if file.owner != username {
            tracing::warn!(filename, username, op = "delete", "rejected: not owner");
            return Err(NsError::NotOwner);
        }
        let primary = self.ss_roster.get(&file.primary.ss_id).ok_or(NsError::SsNotFound)?.control_addr();

        let request = Record::request(OpCode::Delete, username, filename);
        match ss_link::call(primary, &request, self.dial_timeout()).await {
            Some(r) if r.error_code == ErrorCode::Success => {
                self.purge(filename);
                tracing::info!(filename, username, op = "delete", "file deleted");
                Ok(())
            }
            Some(r) => Err(translate_ss_error(r.error_code, r.error_msg)),
            None => Err(NsError::ConnectionFailed),
        }
    }

    /// INFO: metadata only, never probes the storage server.
    pub fn info(&self, user: &str, filename: &str) -> Result<FileRecord> {
        let mut entry = self.files.get_mut(filename).ok_or(NsError::FileNotFound)?;
        if !entry.can_read(user) && entry.owner != user {
            return Err(NsError::AccessDenied);
        }
        entry.touch_access(user);
        Ok(entry.clone())
    }

    pub fn list_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self
            .clients
            .iter()
            .filter(|c| c.active)
            .map(|c| c.username.clone())
            .collect();
        users.sort();
        users
    }

    /// RECENTS: top 5 readable files by `accessed_time`.
    pub fn recents(&self, user: &str) -> Vec<FileRecord> {
        let mut readable: Vec<FileRecord> = self
            .files
            .iter()
            .filter(|e| e.can_read(user) || e.owner == user)
            .map(|e| e.value().clone())
            .collect();
        readable.sort_by(|a, b| b.accessed_time.cmp(&a.accessed_time));
        readable.truncate(RECENTS_LIMIT);
        readable
    }

    /// ADDACCESS: owner-only, target must be a known (ever-registered)
    /// user.
    pub fn add_access(&self, owner: &str, filename: &str, target: &str, access: Access) -> Result<()> {
        if !self.clients.contains_key(target) {
            return Err(NsError::UserNotFound);
        }
        let mut entry = self.files.get_mut(filename).ok_or(NsError::FileNotFound)?;
        if entry.owner != owner {
            tracing::warn!(filename, username = owner, op = "add_access", "rejected: not owner");
            return Err(NsError::NotOwner);
        }
        if target == entry.owner {
            return Err(NsError::InvalidCommand("owner already has full access".into()));
        }
        if !entry.acl.contains_key(target) && entry.acl.len() >= MAX_ACL_ENTRIES {
            return Err(NsError::ServerError("ACL is full".into()));
        }
        entry.acl.insert(target.to_string(), access);
        drop(entry);
        self.invalidate_cache(filename);
        self.persist();
        tracing::info!(filename, username = owner, target, op = "add_access", "access granted");
        Ok(())
    }

    /// REMACCESS: owner-only.
    pub fn rem_access(&self, owner: &str, filename: &str, target: &str) -> Result<()> {
        let mut entry = self.files.get_mut(filename).ok_or(NsError::FileNotFound)?;
        if entry.owner != owner {
            tracing::warn!(filename, username = owner, op = "rem_access", "rejected: not owner");
            return Err(NsError::NotOwner);
        }
        entry.acl.remove(target);
        drop(entry);
        self.invalidate_cache(filename);
        self.persist();
        tracing::info!(filename, username = owner, target, op = "rem_access", "access revoked");
        Ok(())
    }

    /// REQACCESS: records a pending request unless the requester already
    /// has that access or is the owner (I4).
    pub fn req_access(&self, requester: &str, filename: &str, access: Access) -> Result<&'static str> {
        let mut entry = self.files.get_mut(filename).ok_or(NsError::FileNotFound)?;
        if entry.owner == requester {
            return Err(NsError::InvalidCommand("owner already has full access".into()));
        }
        if entry.access_for(requester).map(|a| a.satisfies(access)).unwrap_or(false) {
            return Ok("already has access");
        }
        if entry.pending_requests.contains_key(requester) {
            return Ok("request already pending");
        }
        if entry.pending_requests.len() >= MAX_PENDING_REQUESTS {
            return Err(NsError::ServerError("too many pending requests".into()));
        }
        entry.pending_requests.insert(requester.to_string(), access);
        drop(entry);
        self.persist();
        tracing::info!(filename, username = requester, op = "req_access", "access request submitted");
        Ok("access request submitted")
    }

    pub fn view_requests(&self, owner: &str, filename: &str) -> Result<Vec<(String, Access)>> {
        let entry = self.files.get(filename).ok_or(NsError::FileNotFound)?;
        if entry.owner != owner {
            return Err(NsError::NotOwner);
        }
        Ok(entry.pending_requests.iter().map(|(u, a)| (u.clone(), *a)).collect())
    }

    /// APPROVE: grants Write if the owner overrides with `-W`, else grants
    /// whatever access level was originally requested.
    pub fn approve(&self, owner: &str, filename: &str, target: &str, force_write: bool) -> Result<()> {
        let mut entry = self.files.get_mut(filename).ok_or(NsError::FileNotFound)?;
        if entry.owner != owner {
            tracing::warn!(filename, username = owner, op = "approve", "rejected: not owner");
            return Err(NsError::NotOwner);
        }
        let requested = entry.pending_requests.remove(target).ok_or(NsError::UserNotFound)?;
        let grant = if force_write { Access::Write } else { requested };
        entry.acl.insert(target.to_string(), grant);
        drop(entry);
        self.invalidate_cache(filename);
        self.persist();
        tracing::info!(filename, username = owner, target, op = "approve", "access request approved");
        Ok(())
    }

    pub fn deny(&self, owner: &str, filename: &str, target: &str) -> Result<()> {
        let mut entry = self.files.get_mut(filename).ok_or(NsError::FileNotFound)?;
        if entry.owner != owner {
            tracing::warn!(filename, username = owner, op = "deny", "rejected: not owner");
            return Err(NsError::NotOwner);
        }
        entry.pending_requests.remove(target).ok_or(NsError::UserNotFound)?;
        drop(entry);
        self.persist();
        tracing::info!(filename, username = owner, target, op = "deny", "access request denied");
        Ok(())
    }

    /// Shared locate logic for READ/STREAM/WRITE/UNDO/CHECKPOINT/REVERT/
    /// VIEWCHECKPOINT/LISTCHECKPOINTS/EXEC: ACL check, then prefer the
    /// primary's client endpoint, falling back to the replica's if the
    /// primary doesn't answer a probe.
    pub async fn locate(&self, user: &str, filename: &str, need: Access) -> Result<SocketAddr> {
        let file = self.lookup_cached(filename).ok_or(NsError::FileNotFound)?;
        let allowed = file.owner == user || file.access_for(user).map(|a| a.satisfies(need)).unwrap_or(false);
        if !allowed {
            tracing::warn!(filename, username = user, op = "locate", "rejected: access denied");
            return Err(NsError::AccessDenied);
        }

        let primary_addr = self.ss_client_addr(file.primary.ss_id);
        let primary_up = match primary_addr {
            Some(addr) => ss_link::reachable(addr, self.probe_timeout()).await,
            None => false,
        };

        if primary_up {
            if let Some(addr) = primary_addr {
                return Ok(addr);
            }
        }
        if let Some(replica) = file.replica {
            if let Some(addr) = self.ss_client_addr(replica.ss_id) {
                return Ok(addr);
            }
        }
        if let Some(addr) = primary_addr {
            return Ok(addr);
        }
        Err(NsError::ConnectionFailed)
    }

    /// CREATEFOLDER: broadcast to every active SS, success if at least one
    /// agrees.
    pub async fn create_folder(&self, username: &str, path: &str) -> Result<()> {
        let active = self.active_ss_ordered();
        let mut any_ok = false;
        for ss in active {
            let request = Record::request(OpCode::CreateFolder, username, path);
            if let Some(r) = ss_link::call(ss.control_addr(), &request, self.dial_timeout()).await {
                if r.error_code == ErrorCode::Success {
                    any_ok = true;
                }
            }
        }
        if any_ok {
            tracing::info!(filename = path, username, op = "create_folder", "folder created");
            Ok(())
        } else {
            tracing::warn!(filename = path, username, op = "create_folder", "no storage server accepted folder");
            Err(NsError::ConnectionFailed)
        }
    }

    /// MOVE: owner-only; primary then replica rename; NS state updated
    /// only after the primary confirms.
    pub async fn move_file(&self, username: &str, filename: &str, new_folder: &str) -> Result<String> {
        let file = self.files.get(filename).ok_or(NsError::FileNotFound)?.clone();
        if file.owner != username {
            tracing::warn!(filename, username, op = "move", "rejected: not owner");
            return Err(NsError::NotOwner);
        }
        let primary = self.ss_roster.get(&file.primary.ss_id).ok_or(NsError::SsNotFound)?.control_addr();

        let base = filename.rsplit('/').next().unwrap_or(filename);
        let new_name = if new_folder.is_empty() { base.to_string() } else { format!("{new_folder}/{base}") };

        let request = Record::request(OpCode::Move, username, filename).with_data(new_name.clone());
        let reply = ss_link::call(primary, &request, self.dial_timeout()).await;
        match reply {
            Some(r) if r.error_code == ErrorCode::Success => {}
            Some(r) => return Err(translate_ss_error(r.error_code, r.error_msg)),
            None => return Err(NsError::ConnectionFailed),
        }

        if let Some(replica) = file.replica {
            if let Some(addr) = self.ss_roster.get(&replica.ss_id).map(|s| s.control_addr()) {
                let replica_req = Record::request(OpCode::Move, username, filename).with_data(new_name.clone());
                ss_link::call(addr, &replica_req, self.dial_timeout()).await;
            }
        }

        self.files.remove(filename);
        self.trie.lock().unwrap().remove(filename);
        self.invalidate_cache(filename);
        let mut moved = file.clone();
        moved.filename = new_name.clone();
        moved.touch_modify();
        self.files.insert(new_name.clone(), moved);
        self.trie.lock().unwrap().insert(&new_name);
        for ss_id in [Some(file.primary.ss_id), file.replica.map(|r| r.ss_id)].into_iter().flatten() {
            if let Some(mut ss) = self.ss_roster.get_mut(&ss_id) {
                ss.claimed_files.remove(filename);
                ss.claimed_files.insert(new_name.clone());
            }
        }
        self.persist();
        tracing::info!(filename, username, new_name = %new_name, op = "move", "file moved");
        Ok(new_name)
    }

    /// VIEWFOLDER: NS-local prefix filter.
    pub fn view_folder(&self, user: &str, folder: &str) -> Vec<FileRecord> {
        let names = self.trie.lock().unwrap().list_prefix(folder);
        names
            .into_iter()
            .filter_map(|n| self.files.get(&n).map(|e| e.value().clone()))
            .filter(|f| f.can_read(user) || f.owner == user)
            .collect()
    }
}

fn translate_ss_error(code: ErrorCode, msg: String) -> NsError {
    match code {
        ErrorCode::FileNotFound => NsError::FileNotFound,
        ErrorCode::FileExists => NsError::FileExists,
        ErrorCode::AccessDenied => NsError::AccessDenied,
        ErrorCode::NotOwner => NsError::NotOwner,
        _ => NsError::ServerError(msg),
    }
}

fn format_listing(files: &[FileRecord], long: bool) -> String {
    let mut out = String::new();
    if long {
        out.push_str("---------------------------------------------------------\n");
        out.push_str("|  Filename  | Words | Chars | Last Access Time | Owner |\n");
        out.push_str("|------------|-------|-------|------------------|-------|\n");
        for f in files {
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                f.filename, f.word_count, f.char_count, f.accessed_time, f.owner
            ));
        }
    } else {
        for f in files {
            out.push_str(&f.filename);
            out.push('\n');
        }
    }
    out
}
