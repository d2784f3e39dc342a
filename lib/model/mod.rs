use serde::Serialize;

/// One pseudonym identity: a (partner, AdSwizz ID) pair with uniqueness flags
/// and the most recent activity data, written to the identities index under
/// the document id `partnerkey_adswizzid`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityRecord {
    /// Lower-cased grouping identifier
    pub adswizz_id: String,
    pub partnerkey: String,
    /// Max `payload.occurredon` seen for this partner in the window
    pub last_activity: String,
    /// Distinct CMP user ids for this partner
    pub total_cmp_userids: u64,
    /// Distinct CMP user ids summed across all partners of this AdSwizz ID
    pub total_cmp_userids_global: u64,
    pub unique_adswizzid_partner: bool,
    pub unique_adswizzid_global: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmp_userid: Option<String>,
    pub tc_string_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tc_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// Epoch seconds; set on first insert only, never overwritten
    pub createdon: i64,
    /// Epoch seconds; refreshed on every write
    pub updatedon: i64,
}

impl IdentityRecord {
    pub fn document_id(&self) -> String {
        format!("{}_{}", self.partnerkey, self.adswizz_id)
    }

    /// Payload for the update branch of an upsert. Omits `createdon` so an
    /// existing document keeps its original creation stamp.
    pub fn update_view(&self) -> UpdateView<'_> {
        UpdateView {
            adswizz_id: &self.adswizz_id,
            partnerkey: &self.partnerkey,
            last_activity: &self.last_activity,
            total_cmp_userids: self.total_cmp_userids,
            total_cmp_userids_global: self.total_cmp_userids_global,
            unique_adswizzid_partner: self.unique_adswizzid_partner,
            unique_adswizzid_global: self.unique_adswizzid_global,
            cmp_userid: self.cmp_userid.as_deref(),
            tc_string_exists: self.tc_string_exists,
            tc_string: self.tc_string.as_deref(),
            uuid: self.uuid.as_deref(),
            updatedon: self.updatedon,
        }
    }

    /// Payload for the insert branch of an upsert. Omits `updatedon`, which is
    /// redundant with `createdon` on first insert.
    pub fn upsert_view(&self) -> UpsertView<'_> {
        UpsertView {
            adswizz_id: &self.adswizz_id,
            partnerkey: &self.partnerkey,
            last_activity: &self.last_activity,
            total_cmp_userids: self.total_cmp_userids,
            total_cmp_userids_global: self.total_cmp_userids_global,
            unique_adswizzid_partner: self.unique_adswizzid_partner,
            unique_adswizzid_global: self.unique_adswizzid_global,
            cmp_userid: self.cmp_userid.as_deref(),
            tc_string_exists: self.tc_string_exists,
            tc_string: self.tc_string.as_deref(),
            uuid: self.uuid.as_deref(),
            createdon: self.createdon,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UpdateView<'a> {
    adswizz_id: &'a str,
    partnerkey: &'a str,
    last_activity: &'a str,
    total_cmp_userids: u64,
    total_cmp_userids_global: u64,
    unique_adswizzid_partner: bool,
    unique_adswizzid_global: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    cmp_userid: Option<&'a str>,
    tc_string_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tc_string: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uuid: Option<&'a str>,
    updatedon: i64,
}

#[derive(Debug, Serialize)]
pub struct UpsertView<'a> {
    adswizz_id: &'a str,
    partnerkey: &'a str,
    last_activity: &'a str,
    total_cmp_userids: u64,
    total_cmp_userids_global: u64,
    unique_adswizzid_partner: bool,
    unique_adswizzid_global: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    cmp_userid: Option<&'a str>,
    tc_string_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tc_string: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uuid: Option<&'a str>,
    createdon: i64,
}

#[cfg(test)]
pub(crate) fn sample_record(partnerkey: &str, adswizz_id: &str) -> IdentityRecord {
    IdentityRecord {
        adswizz_id: adswizz_id.to_string(),
        partnerkey: partnerkey.to_string(),
        last_activity: "2024-01-01T00:00:00+00:00".to_string(),
        total_cmp_userids: 1,
        total_cmp_userids_global: 1,
        unique_adswizzid_partner: true,
        unique_adswizzid_global: true,
        cmp_userid: Some("u1".to_string()),
        tc_string_exists: false,
        tc_string: None,
        uuid: None,
        createdon: 1_700_000_000,
        updatedon: 1_700_000_000,
    }
}
