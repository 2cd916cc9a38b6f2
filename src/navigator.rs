//! Remote folder picker.
//!
//! The navigator walks the MEGA folder tree through the backend. The server
//! is authoritative for the current and parent paths: the client only builds
//! a path when it asks for a child, and it displays whatever the listing
//! response reports.

use crate::api::CloudBackupApi;
use crate::error::{FieldName, FormError};
use crate::form::Field;
use crate::models::{CreateFolderRequest, ListFoldersRequest, MegaCredentials};

pub const ROOT: &str = "/";
pub const EMPTY_LISTING: &str = "No subfolders in this directory.";

/// Supplies the credentials sent with every listing and creation request.
///
/// `None` tells the backend to use the credentials it has stored.
pub trait CredentialSupplier {
    fn credentials(&self) -> Option<MegaCredentials>;
}

impl<F> CredentialSupplier for F
where
    F: Fn() -> Option<MegaCredentials>,
{
    fn credentials(&self) -> Option<MegaCredentials> {
        self()
    }
}

/// Receives the folder the user confirmed.
pub trait SelectionSink {
    fn select(&mut self, path: &str);
}

impl<F> SelectionSink for F
where
    F: FnMut(&str),
{
    fn select(&mut self, path: &str) {
        self(path)
    }
}

/// Where the picker is presented (a dialog, a terminal, a test recorder).
pub trait PickerTarget {
    fn show(&mut self, view: &PickerView);
    fn render(&mut self, view: &PickerView);
    fn close(&mut self);
}

impl<T: PickerTarget + ?Sized> PickerTarget for &mut T {
    fn show(&mut self, view: &PickerView) {
        (**self).show(view)
    }

    fn render(&mut self, view: &PickerView) {
        (**self).render(view)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PickerRow {
    Loading,
    Folder(String),
    /// Disabled placeholder shown instead of an empty list.
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PickerView {
    pub current_path: String,
    pub rows: Vec<PickerRow>,
    pub error: Option<String>,
    pub new_folder: Field,
    pub creating: bool,
    pub open: bool,
}

impl PickerView {
    fn new() -> Self {
        Self {
            current_path: ROOT.to_string(),
            rows: Vec::new(),
            error: None,
            new_folder: Field::hidden(),
            creating: false,
            open: true,
        }
    }

    pub fn folders(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().filter_map(|row| match row {
            PickerRow::Folder(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

/// Handle for one in-flight listing request.
#[derive(Debug)]
pub struct NavigationTicket {
    seq: u64,
    path: String,
}

impl NavigationTicket {
    pub fn path(&self) -> &str {
        &self.path
    }
}

pub struct FolderNavigator<'a, A, C, S, T> {
    api: &'a A,
    credentials: C,
    on_select: S,
    target: T,
    current_path: String,
    parent_path: String,
    view: PickerView,
    issued: u64,
}

impl<'a, A, C, S, T> FolderNavigator<'a, A, C, S, T>
where
    A: CloudBackupApi,
    C: CredentialSupplier,
    S: SelectionSink,
    T: PickerTarget,
{
    /// Presents the picker and loads the root folder.
    pub async fn open(api: &'a A, credentials: C, on_select: S, target: T) -> Self {
        let mut navigator = Self {
            api,
            credentials,
            on_select,
            target,
            current_path: ROOT.to_string(),
            parent_path: ROOT.to_string(),
            view: PickerView::new(),
            issued: 0,
        };
        navigator.target.show(&navigator.view);
        navigator.navigate(ROOT).await;
        navigator
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    #[cfg(test)]
    pub fn parent_path(&self) -> &str {
        &self.parent_path
    }

    pub fn view(&self) -> &PickerView {
        &self.view
    }

    pub fn is_open(&self) -> bool {
        self.view.open
    }

    pub async fn navigate(&mut self, path: &str) {
        let ticket = self.begin_navigation(path);
        let request = ListFoldersRequest::new(ticket.path(), self.credentials.credentials());
        let result = self.api.list_folders(&request).await;
        self.finish_navigation(ticket, result);
    }

    /// Starts a listing request. Any ticket issued earlier becomes stale.
    pub fn begin_navigation(&mut self, path: &str) -> NavigationTicket {
        self.issued += 1;
        self.view.error = None;
        self.view.rows = vec![PickerRow::Loading];
        self.target.render(&self.view);
        tracing::debug!("Listing remote folder {} (request {})", path, self.issued);
        NavigationTicket {
            seq: self.issued,
            path: path.to_string(),
        }
    }

    /// Applies a listing result unless a newer request has been issued since.
    ///
    /// Returns whether the result was applied.
    pub fn finish_navigation(
        &mut self,
        ticket: NavigationTicket,
        result: Result<crate::models::FolderListing, crate::error::ApiError>,
    ) -> bool {
        if ticket.seq != self.issued {
            tracing::debug!(
                "Discarding stale listing for {} (request {}, latest {})",
                ticket.path,
                ticket.seq,
                self.issued
            );
            return false;
        }

        match result {
            Ok(listing) => {
                self.current_path = listing.path;
                self.parent_path = listing.parent;
                self.view.current_path = self.current_path.clone();
                self.view.rows = if listing.folders.is_empty() {
                    vec![PickerRow::Empty]
                } else {
                    listing.folders.into_iter().map(PickerRow::Folder).collect()
                };
                self.view.error = None;
            }
            Err(e) => {
                tracing::warn!("Failed to list {}: {}", ticket.path, e);
                self.view.rows.clear();
                self.view.error = Some(e.user_message("Could not load folders."));
            }
        }
        self.target.render(&self.view);
        true
    }

    pub async fn ascend(&mut self) {
        let parent = self.parent_path.clone();
        self.navigate(&parent).await;
    }

    pub async fn select_child(&mut self, name: &str) {
        let path = join_path(&self.current_path, name);
        self.navigate(&path).await;
    }

    pub fn show_new_folder_input(&mut self) {
        self.view.new_folder.hidden = false;
        self.target.render(&self.view);
    }

    /// Creates `name` inside the current folder, then reloads the listing.
    pub async fn create_folder(&mut self, name: &str) -> Result<(), FormError> {
        self.view.new_folder.set(name);
        let folder_name = self.view.new_folder.trimmed().to_string();
        if !self.view.new_folder.check(!folder_name.is_empty()) {
            self.target.render(&self.view);
            return Err(FormError::Invalid(vec![FieldName::NewFolderName]));
        }

        self.view.creating = true;
        self.target.render(&self.view);

        let credentials = self.credentials.credentials();
        let request = CreateFolderRequest {
            folder_name,
            path: self.current_path.clone(),
            email: credentials.as_ref().map(|c| c.email.clone()),
            password: credentials.map(|c| c.password),
        };
        let result = self.api.create_folder(&request).await;
        self.view.creating = false;

        match result {
            Ok(()) => {
                tracing::info!("Created folder {} in {}", request.folder_name, request.path);
                self.view.new_folder.clear();
                self.view.new_folder.hidden = true;
                let current = self.current_path.clone();
                self.navigate(&current).await;
                Ok(())
            }
            Err(e) => {
                let message = e.user_message("Failed to create folder.");
                self.view.error = Some(message.clone());
                self.target.render(&self.view);
                Err(FormError::Remote(message))
            }
        }
    }

    /// Hands the current folder to the caller and closes the picker.
    pub fn confirm_selection(&mut self) {
        self.on_select.select(&self.current_path);
        self.view.open = false;
        self.target.close();
    }

    /// Closes the picker without selecting anything.
    pub fn cancel(&mut self) {
        self.view.open = false;
        self.target.close();
    }
}

/// Joins a child folder onto `parent`, collapsing duplicate slashes.
pub fn join_path(parent: &str, child: &str) -> String {
    let joined = format!("{}/{}", parent.trim_end_matches('/'), child);
    let mut path = String::with_capacity(joined.len());
    for c in joined.chars() {
        if c == '/' && path.ends_with('/') {
            continue;
        }
        path.push(c);
    }
    path
}
