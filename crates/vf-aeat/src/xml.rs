//! # Wire Serializer — SOAP Envelope and Record XML
//!
//! Renders one [`Record`] inside the authority's SOAP envelope. Elements are
//! written in the order the `SuministroLR`/`SuministroInformacion` schemas
//! fix, with the chaining block and the computer-system block always
//! present.
//!
//! ## Determinism
//!
//! Output is a pure function of the envelope inputs: no timestamps, no
//! generated identifiers, fixed indentation. The persisted artifact is the
//! rendered envelope, so an auditor can reproduce it byte for byte from the
//! stored record alone.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use vf_core::{FiscalIdentifier, InvoiceIdentifier, Recipient};
use vf_record::{
    BreakdownLine, ComputerSystem, Record, RecordBody, Registration, HASH_ALGORITHM_SHA256,
    ID_VERSION,
};

use crate::error::SubmissionError;

/// SOAP 1.1 envelope namespace.
pub const NS_SOAPENV: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Namespace of the submission message (`sum:` prefix).
pub const NS_SUM: &str = "https://www2.agenciatributaria.gob.es/static_files/common/internet/dep/aplicaciones/es/aeat/tike/cont/ws/SuministroLR.xsd";

/// Namespace of the record content (`sum1:` prefix).
pub const NS_SUM1: &str = "https://www2.agenciatributaria.gob.es/static_files/common/internet/dep/aplicaciones/es/aeat/tike/cont/ws/SuministroInformacion.xsd";

/// A record addressed to the authority on behalf of an issuer.
#[derive(Debug, Clone, Copy)]
pub struct Envelope<'a> {
    /// Taxpayer obliged to issue the record.
    pub issuer: &'a FiscalIdentifier,
    /// Third party submitting on the issuer's behalf.
    pub representative: Option<&'a FiscalIdentifier>,
    /// The record.
    pub record: &'a Record,
}

impl<'a> Envelope<'a> {
    /// Envelope without a representative.
    pub fn new(issuer: &'a FiscalIdentifier, record: &'a Record) -> Self {
        Self {
            issuer,
            representative: None,
            record,
        }
    }

    /// Set the representative.
    pub fn with_representative(mut self, representative: Option<&'a FiscalIdentifier>) -> Self {
        self.representative = representative;
        self
    }

    /// Render the envelope as an XML document.
    ///
    /// # Errors
    ///
    /// Returns [`SubmissionError::Serialization`] if the writer fails.
    pub fn render(&self) -> Result<String, SubmissionError> {
        let mut out = XmlOut::new();
        self.write(&mut out).map_err(xml)?;
        out.finish()
    }

    fn write(&self, out: &mut XmlOut) -> Result<(), quick_xml::Error> {
        out.decl()?;
        out.open_with(
            "soapenv:Envelope",
            &[
                ("xmlns:soapenv", NS_SOAPENV),
                ("xmlns:sum", NS_SUM),
                ("xmlns:sum1", NS_SUM1),
            ],
        )?;
        out.empty("soapenv:Header")?;
        out.open("soapenv:Body")?;
        out.open("sum:RegFactuSistemaFacturacion")?;

        out.open("sum:Cabecera")?;
        out.open("sum1:ObligadoEmision")?;
        write_party(out, self.issuer)?;
        out.close("sum1:ObligadoEmision")?;
        if let Some(rep) = self.representative {
            out.open("sum1:Representante")?;
            write_party(out, rep)?;
            out.close("sum1:Representante")?;
        }
        out.close("sum:Cabecera")?;

        out.open("sum:RegistroFactura")?;
        write_record(out, self.record)?;
        out.close("sum:RegistroFactura")?;

        out.close("sum:RegFactuSistemaFacturacion")?;
        out.close("soapenv:Body")?;
        out.close("soapenv:Envelope")
    }
}

fn write_record(out: &mut XmlOut, record: &Record) -> Result<(), quick_xml::Error> {
    match record.body() {
        RecordBody::Registration(reg) => {
            out.open("sum1:RegistroAlta")?;
            out.leaf("sum1:IDVersion", ID_VERSION)?;
            write_invoice_id(out, "sum1:IDFactura", &reg.invoice_id, "")?;
            write_registration(out, reg)?;
            write_trailer(out, record)?;
            out.close("sum1:RegistroAlta")
        }
        RecordBody::Cancellation(c) => {
            out.open("sum1:RegistroAnulacion")?;
            out.leaf("sum1:IDVersion", ID_VERSION)?;
            write_invoice_id(out, "sum1:IDFactura", &c.invoice_id, "Anulada")?;
            write_trailer(out, record)?;
            out.close("sum1:RegistroAnulacion")
        }
    }
}

fn write_registration(out: &mut XmlOut, reg: &Registration) -> Result<(), quick_xml::Error> {
    out.leaf("sum1:NombreRazonEmisor", &reg.issuer_name)?;
    out.leaf("sum1:TipoFactura", reg.invoice_type.code())?;
    if let Some(ct) = reg.corrective_type {
        out.leaf("sum1:TipoRectificativa", ct.code())?;
    }
    if !reg.corrected_invoices.is_empty() {
        out.open("sum1:FacturasRectificadas")?;
        for id in &reg.corrected_invoices {
            write_invoice_id(out, "sum1:IDFacturaRectificada", id, "")?;
        }
        out.close("sum1:FacturasRectificadas")?;
    }
    if !reg.replaced_invoices.is_empty() {
        out.open("sum1:FacturasSustituidas")?;
        for id in &reg.replaced_invoices {
            write_invoice_id(out, "sum1:IDFacturaSustituida", id, "")?;
        }
        out.close("sum1:FacturasSustituidas")?;
    }
    if let Some(amounts) = &reg.corrected_amounts {
        out.open("sum1:ImporteRectificacion")?;
        out.leaf("sum1:BaseRectificada", &amounts.base.to_string())?;
        out.leaf("sum1:CuotaRectificada", &amounts.tax.to_string())?;
        out.close("sum1:ImporteRectificacion")?;
    }
    out.leaf("sum1:DescripcionOperacion", &reg.description)?;
    if !reg.recipients.is_empty() {
        out.open("sum1:Destinatarios")?;
        for r in &reg.recipients {
            write_recipient(out, r)?;
        }
        out.close("sum1:Destinatarios")?;
    }
    out.open("sum1:Desglose")?;
    for line in &reg.breakdown {
        write_line(out, line)?;
    }
    out.close("sum1:Desglose")?;
    out.leaf("sum1:CuotaTotal", &reg.total_tax_amount.to_string())?;
    out.leaf("sum1:ImporteTotal", &reg.total_amount.to_string())
}

/// `suffix` is `"Anulada"` inside a cancellation's own identifier.
fn write_invoice_id(
    out: &mut XmlOut,
    element: &str,
    id: &InvoiceIdentifier,
    suffix: &str,
) -> Result<(), quick_xml::Error> {
    out.open(element)?;
    out.leaf(&format!("sum1:IDEmisorFactura{suffix}"), id.issuer_id.as_str())?;
    out.leaf(
        &format!("sum1:NumSerieFactura{suffix}"),
        id.invoice_number.as_str(),
    )?;
    out.leaf(
        &format!("sum1:FechaExpedicionFactura{suffix}"),
        &id.issue_date.to_wire(),
    )?;
    out.close(element)
}

fn write_party(out: &mut XmlOut, party: &FiscalIdentifier) -> Result<(), quick_xml::Error> {
    out.leaf("sum1:NombreRazon", &party.name)?;
    out.leaf("sum1:NIF", party.tax_id.as_str())
}

fn write_recipient(out: &mut XmlOut, recipient: &Recipient) -> Result<(), quick_xml::Error> {
    out.open("sum1:IDDestinatario")?;
    match recipient {
        Recipient::Domestic(id) => write_party(out, id)?,
        Recipient::Foreign(f) => {
            out.leaf("sum1:NombreRazon", &f.name)?;
            out.open("sum1:IDOtro")?;
            out.leaf("sum1:CodigoPais", f.country.as_str())?;
            out.leaf("sum1:IDType", f.id_type.code())?;
            out.leaf("sum1:ID", &f.value)?;
            out.close("sum1:IDOtro")?;
        }
    }
    out.close("sum1:IDDestinatario")
}

fn write_line(out: &mut XmlOut, line: &BreakdownLine) -> Result<(), quick_xml::Error> {
    out.open("sum1:DetalleDesglose")?;
    out.leaf("sum1:Impuesto", line.tax_type.code())?;
    if let Some(regime) = &line.regime {
        out.leaf("sum1:ClaveRegimen", &regime.code())?;
    }
    out.leaf("sum1:CalificacionOperacion", line.operation.code())?;
    out.leaf("sum1:TipoImpositivo", &line.tax_rate.to_string())?;
    out.leaf(
        "sum1:BaseImponibleOimporteNoSujeto",
        &line.base_amount.to_string(),
    )?;
    out.leaf("sum1:CuotaRepercutida", &line.tax_amount.to_string())?;
    out.close("sum1:DetalleDesglose")
}

/// Chaining block, system block, timestamp and fingerprint.
fn write_trailer(out: &mut XmlOut, record: &Record) -> Result<(), quick_xml::Error> {
    out.open("sum1:Encadenamiento")?;
    match record.previous() {
        None => out.leaf("sum1:PrimerRegistro", "S")?,
        Some(prev) => {
            out.open("sum1:RegistroAnterior")?;
            out.leaf("sum1:IDEmisorFactura", prev.invoice_id.issuer_id.as_str())?;
            out.leaf(
                "sum1:NumSerieFactura",
                prev.invoice_id.invoice_number.as_str(),
            )?;
            out.leaf(
                "sum1:FechaExpedicionFactura",
                &prev.invoice_id.issue_date.to_wire(),
            )?;
            out.leaf("sum1:Huella", prev.hash.as_str())?;
            out.close("sum1:RegistroAnterior")?;
        }
    }
    out.close("sum1:Encadenamiento")?;
    write_system(out, record.system())?;
    out.leaf(
        "sum1:FechaHoraHusoGenRegistro",
        &record.hashed_at().to_iso8601(),
    )?;
    out.leaf("sum1:TipoHuella", HASH_ALGORITHM_SHA256)?;
    out.leaf("sum1:Huella", record.hash().as_str())
}

fn write_system(out: &mut XmlOut, system: &ComputerSystem) -> Result<(), quick_xml::Error> {
    out.open("sum1:SistemaInformatico")?;
    write_party(out, &system.vendor)?;
    out.leaf("sum1:NombreSistemaInformatico", &system.name)?;
    out.leaf("sum1:IdSistemaInformatico", &system.id)?;
    out.leaf("sum1:Version", &system.version)?;
    out.leaf("sum1:NumeroInstalacion", &system.installation_number)?;
    out.leaf(
        "sum1:TipoUsoPosibleSoloVerifactu",
        flag(system.only_supports_verifactu),
    )?;
    out.leaf(
        "sum1:TipoUsoPosibleMultiOT",
        flag(system.supports_multiple_taxpayers),
    )?;
    out.leaf(
        "sum1:IndicadorMultiplesOT",
        flag(system.has_multiple_taxpayers),
    )?;
    out.close("sum1:SistemaInformatico")
}

fn flag(value: bool) -> &'static str {
    if value {
        "S"
    } else {
        "N"
    }
}

fn xml<E: std::fmt::Display>(e: E) -> SubmissionError {
    SubmissionError::Serialization(e.to_string())
}

/// Thin wrapper over the quick-xml writer with element helpers.
struct XmlOut {
    w: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new() -> Self {
        Self {
            w: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn decl(&mut self) -> Result<(), quick_xml::Error> {
        self.w
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    }

    fn open(&mut self, name: &str) -> Result<(), quick_xml::Error> {
        self.w.write_event(Event::Start(BytesStart::new(name)))
    }

    fn open_with(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), quick_xml::Error> {
        let start = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.w.write_event(Event::Start(start))
    }

    fn empty(&mut self, name: &str) -> Result<(), quick_xml::Error> {
        self.w.write_event(Event::Empty(BytesStart::new(name)))
    }

    fn close(&mut self, name: &str) -> Result<(), quick_xml::Error> {
        self.w.write_event(Event::End(BytesEnd::new(name)))
    }

    fn leaf(&mut self, name: &str, text: &str) -> Result<(), quick_xml::Error> {
        self.open(name)?;
        self.w.write_event(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    fn finish(self) -> Result<String, SubmissionError> {
        String::from_utf8(self.w.into_inner()).map_err(xml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vf_core::{
        Amount, CountryCode, ForeignFiscalIdentifier, ForeignIdType, HashedAt, InvoiceNumber,
        InvoiceType, IssueDate, OperationType, RegimeCode, TaxId, TaxRate, TaxType,
    };
    use vf_record::{Cancellation, Draft, RegistrationBuilder};

    fn issuer() -> FiscalIdentifier {
        FiscalIdentifier::new("Acme & Sons SL", TaxId::new("B12345678").unwrap()).unwrap()
    }

    fn system() -> ComputerSystem {
        ComputerSystem {
            vendor: FiscalIdentifier::new("Vendor SL", TaxId::new("B87654321").unwrap()).unwrap(),
            name: "Ledger".into(),
            id: "LG".into(),
            version: "1.0.0".into(),
            installation_number: "1".into(),
            only_supports_verifactu: true,
            supports_multiple_taxpayers: false,
            has_multiple_taxpayers: false,
        }
    }

    fn id(n: &str, d: u32) -> InvoiceIdentifier {
        InvoiceIdentifier::new(
            TaxId::new("B12345678").unwrap(),
            InvoiceNumber::new(n).unwrap(),
            IssueDate::from_ymd(2024, 5, d).unwrap(),
        )
    }

    fn at() -> HashedAt {
        HashedAt::parse("2024-05-01T10:00:00+02:00").unwrap()
    }

    fn registration() -> Record {
        let body = RegistrationBuilder::new(id("FA-001", 1), "Acme & Sons SL", InvoiceType::F1)
            .description("Consultoría <mayo>")
            .recipient(vf_core::Recipient::Foreign(
                ForeignFiscalIdentifier::new(
                    "Globex GmbH",
                    CountryCode::new("DE").unwrap(),
                    ForeignIdType::VatNumber,
                    "DE123456789",
                )
                .unwrap(),
            ))
            .line(BreakdownLine {
                tax_type: TaxType::Iva,
                regime: Some(RegimeCode::GENERAL),
                operation: OperationType::S1,
                tax_rate: TaxRate::parse("21.00").unwrap(),
                base_amount: Amount::parse("100.00").unwrap(),
                tax_amount: Amount::parse("21.00").unwrap(),
            })
            .build()
            .unwrap();
        Draft::new(RecordBody::Registration(body), system())
            .unwrap()
            .link(None, at())
            .unwrap()
    }

    #[test]
    fn genesis_registration_has_first_record_flag() {
        let record = registration();
        let xml = Envelope::new(&issuer(), &record).render().unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<sum1:PrimerRegistro>S</sum1:PrimerRegistro>"));
        assert!(!xml.contains("RegistroAnterior"));
        assert!(xml.contains(&format!(
            "<sum1:Huella>{}</sum1:Huella>",
            record.hash().as_str()
        )));
        assert!(xml.contains("<sum1:FechaHoraHusoGenRegistro>2024-05-01T10:00:00+02:00<"));
    }

    #[test]
    fn text_is_escaped() {
        let record = registration();
        let xml = Envelope::new(&issuer(), &record).render().unwrap();
        assert!(xml.contains("Acme &amp; Sons SL"));
        assert!(xml.contains("Consultoría &lt;mayo&gt;"));
    }

    #[test]
    fn registration_elements_in_schema_order() {
        let record = registration();
        let xml = Envelope::new(&issuer(), &record).render().unwrap();
        let order = [
            "<sum1:IDVersion>",
            "<sum1:IDFactura>",
            "<sum1:NombreRazonEmisor>",
            "<sum1:TipoFactura>",
            "<sum1:DescripcionOperacion>",
            "<sum1:Destinatarios>",
            "<sum1:IDOtro>",
            "<sum1:Desglose>",
            "<sum1:ClaveRegimen>01<",
            "<sum1:CalificacionOperacion>S1<",
            "<sum1:CuotaTotal>21.00<",
            "<sum1:ImporteTotal>121.00<",
            "<sum1:Encadenamiento>",
            "<sum1:SistemaInformatico>",
            "<sum1:FechaHoraHusoGenRegistro>",
            "<sum1:TipoHuella>01<",
        ];
        let mut from = 0;
        for needle in order {
            let pos = xml[from..]
                .find(needle)
                .unwrap_or_else(|| panic!("{needle} missing or out of order"));
            from += pos + needle.len();
        }
    }

    #[test]
    fn cancellation_uses_annulled_identifier_and_chains() {
        let first = registration();
        let cancel = Draft::new(
            RecordBody::Cancellation(Cancellation {
                invoice_id: id("FA-001", 1),
            }),
            system(),
        )
        .unwrap()
        .link(Some(first.as_predecessor()), at())
        .unwrap();
        let xml = Envelope::new(&issuer(), &cancel).render().unwrap();
        assert!(xml.contains("<sum1:RegistroAnulacion>"));
        assert!(xml.contains("<sum1:IDEmisorFacturaAnulada>B12345678<"));
        assert!(xml.contains("<sum1:NumSerieFacturaAnulada>FA-001<"));
        assert!(xml.contains("<sum1:FechaExpedicionFacturaAnulada>01-05-2024<"));
        assert!(xml.contains("<sum1:RegistroAnterior>"));
        assert!(xml.contains(&format!(
            "<sum1:Huella>{}</sum1:Huella>",
            first.hash().chain_reference().as_str()
        )));
        assert!(!xml.contains("NombreRazonEmisor"));
    }

    #[test]
    fn representative_is_optional() {
        let record = registration();
        let rep = FiscalIdentifier::new("Gestoría SL", TaxId::new("B11111111").unwrap()).unwrap();
        let without = Envelope::new(&issuer(), &record).render().unwrap();
        assert!(!without.contains("Representante"));
        let with = Envelope::new(&issuer(), &record)
            .with_representative(Some(&rep))
            .render()
            .unwrap();
        assert!(with.contains("<sum1:Representante>"));
        assert!(with.contains("<sum1:NIF>B11111111</sum1:NIF>"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let record = registration();
        let a = Envelope::new(&issuer(), &record).render().unwrap();
        let b = Envelope::new(&issuer(), &record.clone()).render().unwrap();
        assert_eq!(a, b);
    }
}
