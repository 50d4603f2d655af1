//! Turns the rows of one classified sheet into typed entity rows.

use std::collections::HashSet;

use crate::registry::{
    CreditDebit, Issuer, Officer, RecordkeepingEntry, RestrictionTemplate, Security, Shareholder,
    SourceRef, TransferTx, TxType, NO_CUSIP,
};

use super::{
    cell,
    classify::SheetCategory,
    normalize::{
        find_header_index, find_header_index_or_exact, is_blank_context, normalize_cusip,
        parse_date_cell, parse_fraction, parse_optional_count, parse_quantity,
    },
    row_is_empty, DataQualityWarning, Sheet, SheetParseError,
};

/// Written to `notes` when a row has none, so that "left blank" can be told
/// apart from an explicitly empty value later on.
pub const NO_NOTES: &str = "NIL";

/// One typed row produced by an extractor.
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum SheetRow {
    Issuer(Issuer),
    Security(Security),
    Officer(Officer),
    Shareholder(Shareholder),
    Transaction(TransferTx),
    Recordkeeping(RecordkeepingEntry),
    Restriction(RestrictionTemplate),
}

#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct SheetExtract {
    pub rows: Vec<SheetRow>,
    pub warnings: Vec<DataQualityWarning>,
    pub errors: Vec<SheetParseError>,
}

impl SheetExtract {
    pub fn extend(&mut self, other: SheetExtract) {
        self.rows.extend(other.rows);
        self.warnings.extend(other.warnings);
        self.errors.extend(other.errors);
    }
}

// ---------- Carried context ----------

/// Columns whose value is usually only written on the row where it changes.
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct ContextColumns {
    pub cusip: Option<usize>,
    pub issue_name: Option<usize>,
    pub ticker: Option<usize>,
    pub trading_platform: Option<usize>,
    pub security_type: Option<usize>,
    pub issuance_type: Option<usize>,
}

impl ContextColumns {
    pub fn detect(headers: &[String]) -> ContextColumns {
        ContextColumns {
            cusip: find_header_index(headers, &["cusip"]),
            issue_name: find_header_index_or_exact(
                headers,
                &["issue name", "security name", "security description", "name of issue"],
                &["issue", "security"],
            ),
            ticker: find_header_index(headers, &["ticker", "symbol"]),
            trading_platform: find_header_index(headers, &["platform", "exchange", "market"]),
            security_type: find_header_index(
                headers,
                &["security type", "type of security", "class of security", "share class"],
            ),
            issuance_type: find_header_index(headers, &["issuance"]),
        }
    }
}

/// The last real value seen in each context column of a sheet.
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct CarriedContext {
    pub cusip: String,
    pub issue_name: String,
    pub ticker: String,
    pub trading_platform: String,
    pub security_type: String,
    pub issuance_type: String,
}

impl CarriedContext {
    /// The context in effect for `row`: every blank context cell keeps the
    /// previous value, every filled one replaces it.
    pub fn advance(&self, cols: &ContextColumns, row: &[String]) -> CarriedContext {
        let carry = |idx: Option<usize>, prev: &str| -> String {
            let v = cell(row, idx);
            if is_blank_context(v) {
                prev.to_string()
            } else {
                v.trim().to_string()
            }
        };
        let raw_cusip = cell(row, cols.cusip);
        CarriedContext {
            cusip: if is_blank_context(raw_cusip) {
                self.cusip.clone()
            } else {
                normalize_cusip(raw_cusip)
            },
            issue_name: carry(cols.issue_name, &self.issue_name),
            ticker: carry(cols.ticker, &self.ticker),
            trading_platform: carry(cols.trading_platform, &self.trading_platform),
            security_type: carry(cols.security_type, &self.security_type),
            issuance_type: carry(cols.issuance_type, &self.issuance_type),
        }
    }

    /// CUSIP to file the row under. Rows with no CUSIP so far share the
    /// placeholder security.
    pub fn cusip_or_placeholder(&self) -> String {
        if self.cusip.is_empty() {
            NO_CUSIP.to_string()
        } else {
            self.cusip.clone()
        }
    }

    pub fn to_security(&self) -> Security {
        Security {
            cusip: self.cusip_or_placeholder(),
            issue_name: self.issue_name.clone(),
            ticker: self.ticker.clone(),
            trading_platform: self.trading_platform.clone(),
            security_type: self.security_type.clone(),
            ..Security::default()
        }
    }
}

// ---------- Column detection ----------

#[derive(Debug, Default)]
struct ShareholderColumns {
    account: Option<usize>,
    name: Option<usize>,
    first_name: Option<usize>,
    middle_name: Option<usize>,
    last_name: Option<usize>,
    address1: Option<usize>,
    address2: Option<usize>,
    city: Option<usize>,
    state: Option<usize>,
    zip: Option<usize>,
    country: Option<usize>,
    tax_id: Option<usize>,
    email: Option<usize>,
    phone: Option<usize>,
    holder_type: Option<usize>,
    ofac_status: Option<usize>,
}

impl ShareholderColumns {
    fn detect(headers: &[String]) -> ShareholderColumns {
        ShareholderColumns {
            account: find_header_index(headers, &["account", "acct"]),
            name: find_header_index_or_exact(
                headers,
                &[
                    "shareholder name", "holder name", "registration name", "registered owner",
                    "full name",
                ],
                &["name", "shareholder", "holder", "registration"],
            ),
            first_name: find_header_index(headers, &["first name", "firstname", "given name"]),
            middle_name: find_header_index(headers, &["middle"]),
            last_name: find_header_index(headers, &["last name", "lastname", "surname"]),
            address1: find_header_index_or_exact(
                headers,
                &["address 1", "address1", "address line 1", "street"],
                &["address", "mailing address"],
            ),
            address2: find_header_index(headers, &["address 2", "address2", "address line 2"]),
            city: find_header_index(headers, &["city"]),
            state: find_header_index_or_exact(headers, &["province"], &["state", "st"]),
            zip: find_header_index(headers, &["zip", "postal"]),
            country: find_header_index(headers, &["country"]),
            tax_id: find_header_index_or_exact(
                headers,
                &["tax id", "taxpayer", "social security"],
                &["tin", "ssn", "ein"],
            ),
            email: find_header_index(headers, &["email", "e-mail"]),
            phone: find_header_index(headers, &["phone"]),
            holder_type: find_header_index(
                headers,
                &["holder type", "shareholder type", "account type", "entity type"],
            ),
            ofac_status: find_header_index(headers, &["ofac"]),
        }
    }

    fn read(&self, row: &[String]) -> Shareholder {
        let get = |idx: Option<usize>| cell(row, idx).trim().to_string();
        Shareholder {
            account_number: get(self.account),
            name: get(self.name),
            first_name: get(self.first_name),
            middle_name: get(self.middle_name),
            last_name: get(self.last_name),
            address1: get(self.address1),
            address2: get(self.address2),
            city: get(self.city),
            state: get(self.state),
            zip: get(self.zip),
            country: get(self.country),
            tax_id: get(self.tax_id),
            email: get(self.email),
            phone: get(self.phone),
            holder_type: get(self.holder_type),
            ofac_status: get(self.ofac_status),
        }
    }
}

#[derive(Debug, Default)]
struct TransactionColumns {
    context: ContextColumns,
    holder: ShareholderColumns,
    tx_type: Option<usize>,
    credit_debit: Option<usize>,
    quantity: Option<usize>,
    credit_date: Option<usize>,
    debit_date: Option<usize>,
    date: Option<usize>,
    certificate_type: Option<usize>,
    status: Option<usize>,
    notes: Option<usize>,
    restriction_code: Option<usize>,
}

impl TransactionColumns {
    fn detect(headers: &[String]) -> TransactionColumns {
        TransactionColumns {
            context: ContextColumns::detect(headers),
            holder: ShareholderColumns::detect(headers),
            tx_type: find_header_index_or_exact(
                headers,
                &["transaction type", "trans type", "type of transaction", "transaction code"],
                &["type", "transaction"],
            ),
            credit_debit: find_header_index(
                headers,
                &["credit/debit", "credit / debit", "debit/credit", "credit_debit", "cr/dr"],
            ),
            quantity: find_header_index(headers, &["quantity", "qty", "shares", "share amount"]),
            credit_date: find_header_index(headers, &["credit date"]),
            debit_date: find_header_index(headers, &["debit date"]),
            date: find_header_index_or_exact(
                headers,
                &["transaction date", "trade date", "date of transaction", "effective date"],
                &["date"],
            ),
            certificate_type: find_header_index(headers, &["certificate", "cert type"]),
            status: find_header_index(headers, &["status"]),
            notes: find_header_index(headers, &["note", "memo", "comment", "remark"]),
            restriction_code: find_header_index(headers, &["restriction", "legend"]),
        }
    }

    /// First non-blank date cell, by credit date, debit date, then the
    /// generic date column.
    fn date_cell<'a>(&self, row: &'a [String]) -> &'a str {
        [self.credit_date, self.debit_date, self.date]
            .into_iter()
            .map(|idx| cell(row, idx).trim())
            .find(|v| !v.is_empty())
            .unwrap_or("")
    }
}

// ---------- Extractors ----------

/// Runs the extractor for `category` over `sheet`. Context carried between
/// rows starts empty for every call.
pub fn extract_sheet(sheet: &Sheet, category: SheetCategory) -> SheetExtract {
    match category {
        SheetCategory::Issuer => extract_issuer(sheet),
        SheetCategory::Securities => extract_securities(sheet),
        SheetCategory::Officers => extract_officers(sheet),
        SheetCategory::Shareholders => extract_shareholders(sheet),
        SheetCategory::Restrictions => extract_restrictions(sheet),
        SheetCategory::Transactions => extract_transactions(sheet, false),
        SheetCategory::RecordKeeping => extract_transactions(sheet, true),
    }
}

enum IssuerField {
    Name,
    DisplayName,
    Address,
    Telephone,
    TaxId,
    Incorporation,
    RegulatoryNotes,
    Other,
}

fn issuer_field(key: &str) -> IssuerField {
    let k = key.trim().to_lowercase();
    let has = |subs: &[&str]| subs.iter().any(|s| k.contains(s));
    if has(&["display name"]) {
        IssuerField::DisplayName
    } else if has(&["issuer name", "company name", "legal name", "entity name"])
        || matches!(k.as_str(), "name" | "issuer" | "company")
    {
        IssuerField::Name
    } else if has(&["address"]) && !has(&["email"]) {
        IssuerField::Address
    } else if has(&["phone"]) {
        IssuerField::Telephone
    } else if has(&["tax id", "federal id", "taxpayer", "employer identification"])
        || matches!(k.as_str(), "tin" | "ein" | "fein")
    {
        IssuerField::TaxId
    } else if has(&["incorporat", "jurisdiction", "domicile"]) {
        IssuerField::Incorporation
    } else if has(&["regulat", "notes"]) {
        IssuerField::RegulatoryNotes
    } else {
        IssuerField::Other
    }
}

/// Issuer sheets are usually key/value pairs down two columns. Some are
/// laid out as a header row with one row of values under it instead, which
/// we recognize by the header row having more than two filled cells.
fn extract_issuer(sheet: &Sheet) -> SheetExtract {
    let mut out = SheetExtract::default();

    let mut pairs: Vec<(String, String)> = Vec::new();
    let first_row_width = sheet.headers().iter().filter(|c| !c.trim().is_empty()).count();
    if first_row_width > 2 {
        let values = sheet.data_rows().next().map_or(&[][..], |(_, r)| r);
        for (i, key) in sheet.headers().iter().enumerate() {
            pairs.push((key.clone(), cell(values, Some(i)).to_string()));
        }
    } else {
        for row in &sheet.rows {
            pairs.push((cell(row, Some(0)).to_string(), cell(row, Some(1)).to_string()));
        }
    }

    let mut issuer = Issuer::default();
    for (key, value) in pairs {
        let key = key.trim();
        let value = value.trim().to_string();
        if key.is_empty() || value.is_empty() {
            continue;
        }
        match issuer_field(key) {
            IssuerField::Name => issuer.name = value,
            IssuerField::DisplayName => issuer.display_name = value,
            IssuerField::Address => issuer.address = value,
            IssuerField::Telephone => issuer.telephone = value,
            IssuerField::TaxId => issuer.tax_id = value,
            IssuerField::Incorporation => issuer.incorporation = value,
            IssuerField::RegulatoryNotes => issuer.regulatory_notes = value,
            IssuerField::Other => {
                issuer.additional_info.insert(key.to_string(), value);
            }
        }
    }

    if issuer.name.is_empty() {
        if issuer.display_name.is_empty() {
            out.errors.push(SheetParseError::new(
                &sheet.name,
                1,
                "No issuer name found".to_string(),
            ));
            return out;
        }
        issuer.name = issuer.display_name.clone();
    }
    if issuer.display_name.is_empty() {
        issuer.display_name = issuer.name.clone();
    }
    out.rows.push(SheetRow::Issuer(issuer));
    out
}

fn extract_securities(sheet: &Sheet) -> SheetExtract {
    let headers = sheet.headers();
    let context = ContextColumns::detect(headers);
    let class_name = find_header_index(headers, &["class"]);
    let authorized = find_header_index(headers, &["authorized"]);
    let status = find_header_index(headers, &["status"]);

    let mut out = SheetExtract::default();
    for (row_num, row) in sheet.data_rows() {
        if row_is_empty(row) {
            continue;
        }
        // One security per row, so nothing carries over.
        let mut sec = CarriedContext::default().advance(&context, row).to_security();
        sec.class_name = cell(row, class_name).trim().to_string();
        sec.status = cell(row, status).trim().to_string();

        let auth_cell = cell(row, authorized);
        sec.total_authorized_shares = parse_optional_count(auth_cell);
        if sec.total_authorized_shares.is_none() && !auth_cell.trim().is_empty() {
            out.warnings.push(DataQualityWarning::new(
                &sheet.name,
                row_num,
                format!("Authorized share count {:?} is not a number", auth_cell.trim()),
            ));
        }
        out.rows.push(SheetRow::Security(sec));
    }
    out
}

fn extract_officers(sheet: &Sheet) -> SheetExtract {
    let headers = sheet.headers();
    let name = find_header_index_or_exact(
        headers,
        &["officer name", "director name", "full name"],
        &["name", "officer", "director"],
    );
    let title = find_header_index(headers, &["title", "position", "role"]);
    let email = find_header_index(headers, &["email", "e-mail"]);
    let phone = find_header_index(headers, &["phone"]);
    // A percentage, with or without the % sign.
    let ownership = find_header_index(headers, &["ownership", "% owned", "percent"]);

    let mut out = SheetExtract::default();
    for (row_num, row) in sheet.data_rows() {
        if row_is_empty(row) {
            continue;
        }
        let ownership_cell = cell(row, ownership).trim().trim_end_matches('%');
        let ownership_percent = parse_fraction(ownership_cell);
        if ownership_percent.is_none() && !ownership_cell.is_empty() {
            out.warnings.push(DataQualityWarning::new(
                &sheet.name,
                row_num,
                format!("Ownership {ownership_cell:?} is not a number. Left blank"),
            ));
        }
        let officer = Officer {
            name: cell(row, name).trim().to_string(),
            title: cell(row, title).trim().to_string(),
            email: cell(row, email).trim().to_string(),
            phone: cell(row, phone).trim().to_string(),
            ownership_percent,
        };
        if officer.name.is_empty() {
            out.errors.push(SheetParseError::new(
                &sheet.name,
                row_num,
                "Officer has no name".to_string(),
            ));
            continue;
        }
        out.rows.push(SheetRow::Officer(officer));
    }
    out
}

fn extract_shareholders(sheet: &Sheet) -> SheetExtract {
    let cols = ShareholderColumns::detect(sheet.headers());
    let mut out = SheetExtract::default();
    for (row_num, row) in sheet.data_rows() {
        if row_is_empty(row) {
            continue;
        }
        let sh = cols.read(row);
        if sh.account_number.is_empty() && sh.display_name().is_empty() {
            out.errors.push(SheetParseError::new(
                &sheet.name,
                row_num,
                "Shareholder has neither an account number nor a name".to_string(),
            ));
            continue;
        }
        out.rows.push(SheetRow::Shareholder(sh));
    }
    out
}

fn extract_restrictions(sheet: &Sheet) -> SheetExtract {
    let headers = sheet.headers();
    let code = find_header_index(headers, &["code"]);
    let name = find_header_index_or_exact(
        headers,
        &["restriction name", "legend name", "title"],
        &["name", "restriction", "type"],
    );
    let legend = find_header_index_or_exact(
        headers,
        &["legend text", "text", "description", "wording"],
        &["legend"],
    );

    let mut out = SheetExtract::default();
    for (row_num, row) in sheet.data_rows() {
        if row_is_empty(row) {
            continue;
        }
        let template = RestrictionTemplate {
            code: cell(row, code).trim().to_uppercase(),
            name: cell(row, name).trim().to_string(),
            legend: cell(row, legend).trim().to_string(),
        };
        if template.code.is_empty() {
            out.errors.push(SheetParseError::new(
                &sheet.name,
                row_num,
                "Restriction has no code".to_string(),
            ));
            continue;
        }
        out.rows.push(SheetRow::Restriction(template));
    }
    out
}

/// Reads a transfer journal. Each row yields a transaction plus the
/// security it's for. Each account yields one shareholder per sheet.
/// Record-keeping books also keep a copy of the row as written.
fn extract_transactions(sheet: &Sheet, record_book: bool) -> SheetExtract {
    let cols = TransactionColumns::detect(sheet.headers());
    let mut out = SheetExtract::default();
    let mut ctx = CarriedContext::default();
    let mut seen_holders = HashSet::<String>::new();

    for (row_num, row) in sheet.data_rows() {
        if row_is_empty(row) {
            continue;
        }
        ctx = ctx.advance(&cols.context, row);
        let source = SourceRef { sheet: sheet.name.clone(), row: row_num };

        let type_cell = cell(row, cols.tx_type).trim();
        let cd_cell = cell(row, cols.credit_debit).trim();
        let stated_direction = CreditDebit::parse(cd_cell);
        if !cd_cell.is_empty() && stated_direction.is_none() {
            out.warnings.push(DataQualityWarning::new(
                &sheet.name,
                row_num,
                format!("Unrecognized credit/debit value {cd_cell:?}"),
            ));
        }

        let transaction_type = if type_cell.is_empty() {
            match stated_direction {
                Some(CreditDebit::Debit) => TxType::TransferDebit,
                Some(CreditDebit::Credit) => TxType::TransferCredit,
                None => TxType::default(),
            }
        } else {
            TxType::parse(type_cell)
        };
        if let Some(stated) = stated_direction {
            if stated != transaction_type.direction() {
                out.warnings.push(DataQualityWarning::new(
                    &sheet.name,
                    row_num,
                    format!(
                        "Credit/Debit column says {stated} but {} is a {}. Recording as {}",
                        transaction_type,
                        transaction_type.direction().to_string().to_lowercase(),
                        transaction_type.direction()
                    ),
                ));
            }
        }

        let raw_qty = parse_quantity(cell(row, cols.quantity));
        if raw_qty < 0 {
            out.warnings.push(DataQualityWarning::new(
                &sheet.name,
                row_num,
                format!(
                    "Negative quantity {raw_qty}. Direction comes from the transaction type, \
                    so {} is recorded",
                    raw_qty.unsigned_abs()
                ),
            ));
        }

        let date_cell = cols.date_cell(row);
        let transaction_date = parse_date_cell(date_cell);
        if transaction_date.is_none() && !date_cell.is_empty() {
            out.errors.push(SheetParseError::new(
                &sheet.name,
                row_num,
                format!("Unrecognized date {date_cell:?}"),
            ));
        }

        let notes = cell(row, cols.notes).trim();
        let holder = cols.holder.read(row);
        let holder_name = holder.display_name();
        let has_holder = !(holder.account_number.is_empty() && holder_name.is_empty());
        let holder_key = if has_holder { holder.natural_key() } else { String::new() };

        let tx = TransferTx {
            cusip: ctx.cusip_or_placeholder(),
            issue_name: ctx.issue_name.clone(),
            security_type: ctx.security_type.clone(),
            issuance_type: ctx.issuance_type.clone(),
            ticker: ctx.ticker.clone(),
            trading_platform: ctx.trading_platform.clone(),
            shareholder_id: None,
            account_number: holder.account_number.clone(),
            holder_key: holder_key.clone(),
            credit_debit: transaction_type.direction(),
            transaction_type,
            quantity: raw_qty.unsigned_abs(),
            transaction_date,
            certificate_type: cell(row, cols.certificate_type).trim().to_string(),
            status: cell(row, cols.status).trim().to_string(),
            notes: if notes.is_empty() { NO_NOTES.to_string() } else { notes.to_string() },
            restriction_code: cell(row, cols.restriction_code).trim().to_uppercase(),
            source,
        };

        out.rows.push(SheetRow::Security(ctx.to_security()));

        if has_holder && seen_holders.insert(holder_key) {
            out.rows.push(SheetRow::Shareholder(holder));
        }

        if record_book {
            out.rows.push(SheetRow::Recordkeeping(RecordkeepingEntry::from_tx(
                &tx,
                &holder_name,
                cd_cell,
            )));
        }
        out.rows.push(SheetRow::Transaction(tx));
    }
    out
}
