// src/services/signing.rs

//! Sessão de assinatura do cliente. Guarda a entrada transitória (opção escolhida, nome,
//! modo de captura, traços) até o commit, e nunca a descarta quando a gravação falha.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::contract::{Contract, ContractOption, Signature, SignatureKind},
    services::contract_service::ContractService,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SelectedOption {
    pub id: Uuid,
    pub label: String,
}

/// Um traço contínuo do desenho, em coordenadas do canvas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stroke {
    pub points: Vec<(f32, f32)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    NeedsOption,
    NeedsName,
    NeedsSignature,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Editing,
    Submitting,
    Signed,
}

#[derive(Debug, Clone)]
pub struct SigningSession {
    selected: Option<SelectedOption>,
    signer_name: String,
    mode: SignatureKind,
    strokes: Vec<Stroke>,
    // Imagem já codificada pelo widget de captura (data URL), quando houver.
    drawn_image: Option<String>,
    state: SessionState,
}

impl Default for SigningSession {
    fn default() -> Self {
        Self {
            selected: None,
            signer_name: String::new(),
            mode: SignatureKind::Drawn,
            strokes: Vec::new(),
            drawn_image: None,
            state: SessionState::Editing,
        }
    }
}

impl SigningSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select_option(&mut self, option: &ContractOption) {
        self.selected = Some(SelectedOption { id: option.id, label: option.label() });
    }

    /// Seleção só pelo id, quando o título não está disponível (ex.: requisição HTTP).
    pub fn select_option_id(&mut self, option_id: Uuid) {
        self.selected = Some(SelectedOption { id: option_id, label: String::new() });
    }

    pub fn set_signer_name(&mut self, name: impl Into<String>) {
        self.signer_name = name.into();
    }

    pub fn set_mode(&mut self, mode: SignatureKind) {
        self.mode = mode;
    }

    pub fn push_stroke(&mut self, points: Vec<(f32, f32)>) {
        if !points.is_empty() {
            self.strokes.push(Stroke { points });
        }
    }

    pub fn set_drawn_image(&mut self, data_url: impl Into<String>) {
        let data_url = data_url.into();
        self.drawn_image = (!data_url.trim().is_empty()).then_some(data_url);
    }

    pub fn clear_drawing(&mut self) {
        self.strokes.clear();
        self.drawn_image = None;
    }

    pub fn signer_name(&self) -> &str {
        &self.signer_name
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn has_drawing(&self) -> bool {
        self.drawn_image.is_some() || self.strokes.iter().any(|s| !s.points.is_empty())
    }

    /// No modo digitado a assinatura é o próprio nome.
    fn has_signature(&self) -> bool {
        match self.mode {
            SignatureKind::Drawn => self.has_drawing(),
            SignatureKind::Typed => !self.signer_name.trim().is_empty(),
        }
    }

    pub fn readiness(&self) -> Readiness {
        if self.selected.is_none() {
            Readiness::NeedsOption
        } else if self.signer_name.trim().is_empty() {
            Readiness::NeedsName
        } else if !self.has_signature() {
            Readiness::NeedsSignature
        } else {
            Readiness::Ready
        }
    }

    pub fn is_ready(&self) -> bool {
        self.readiness() == Readiness::Ready
    }

    /// Texto do botão de aceite para o estado atual.
    pub fn prompt(&self) -> String {
        match self.readiness() {
            Readiness::NeedsOption => "Select an Option to Sign".to_string(),
            Readiness::NeedsName => "Please enter your name".to_string(),
            Readiness::NeedsSignature => "Please provide a signature".to_string(),
            Readiness::Ready => match &self.selected {
                Some(option) if !option.label.is_empty() => format!("Accept & Sign for {}", option.label),
                _ => "Accept & Sign".to_string(),
            },
        }
    }

    fn payload(&self) -> String {
        match self.mode {
            SignatureKind::Typed => self.signer_name.trim().to_string(),
            SignatureKind::Drawn => self
                .drawn_image
                .clone()
                .unwrap_or_else(|| strokes_to_data_url(&self.strokes)),
        }
    }

    pub fn build_signature(&self, signed_at: DateTime<Utc>) -> Result<Signature, AppError> {
        if !self.is_ready() {
            return Err(AppError::InvalidInput(self.prompt()));
        }
        Ok(Signature {
            signer_name: self.signer_name.trim().to_string(),
            signed_at,
            kind: self.mode,
            data: self.payload(),
        })
    }

    /// Grava a assinatura. Em caso de erro a sessão volta a `Editing` com tudo que foi digitado.
    pub async fn commit(
        &mut self,
        service: &ContractService,
        contract_id: Uuid,
    ) -> Result<(Contract, ContractOption), AppError> {
        if self.state == SessionState::Signed {
            return Err(AppError::InvalidInput("Esta sessão já foi assinada.".into()));
        }
        let signature = self.build_signature(Utc::now())?;
        let option_id = match &self.selected {
            Some(option) => option.id,
            None => return Err(AppError::InvalidInput(self.prompt())),
        };

        self.state = SessionState::Submitting;
        match service.sign_contract(contract_id, option_id, signature).await {
            Ok(signed) => {
                self.state = SessionState::Signed;
                Ok(signed)
            }
            Err(e) => {
                tracing::warn!(contract_id = %contract_id, error = %e, "assinatura não gravada; sessão mantida");
                self.state = SessionState::Editing;
                Err(e)
            }
        }
    }
}

/// Codifica os traços como SVG em data URL.
pub fn strokes_to_data_url(strokes: &[Stroke]) -> String {
    let (mut width, mut height) = (1.0_f32, 1.0_f32);
    let mut path = String::new();
    for stroke in strokes {
        for (i, (x, y)) in stroke.points.iter().enumerate() {
            width = width.max(*x);
            height = height.max(*y);
            let cmd = if i == 0 { 'M' } else { 'L' };
            path.push_str(&format!("{}{:.1} {:.1} ", cmd, x, y));
        }
    }

    let svg = format!(
        "<svg xmlns='http://www.w3.org/2000/svg' width='{:.0}' height='{:.0}'><path d='{}' fill='none' stroke='black' stroke-width='2'/></svg>",
        width.ceil(),
        height.ceil(),
        path.trim_end()
    );
    format!("data:image/svg+xml;utf8,{}", percent_encode_svg(&svg))
}

fn percent_encode_svg(svg: &str) -> String {
    let mut out = String::with_capacity(svg.len());
    for c in svg.chars() {
        match c {
            '%' => out.push_str("%25"),
            '#' => out.push_str("%23"),
            '<' => out.push_str("%3C"),
            '>' => out.push_str("%3E"),
            '"' => out.push_str("%22"),
            _ => out.push(c),
        }
    }
    out
}
